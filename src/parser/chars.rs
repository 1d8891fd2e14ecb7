/// Named special characters, reachable from `'\name'` literals and
/// `\{name}` string escapes. `\{xNN..}` gives the char with that hex
/// codepoint.
pub fn named_char(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix('x') {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    Some(match name {
        "n" | "newline" => '\n',
        "t" | "tab" => '\t',
        "r" => '\r',
        "b" => '\u{8}',
        "f" => '\u{c}',
        "0" => '\0',
        "space" => ' ',
        "alpha" => 'α',
        "beta" => 'β',
        "gamma" => 'γ',
        "delta" => 'δ',
        "epsilon" => 'ε',
        "zeta" => 'ζ',
        "eta" => 'η',
        "theta" => 'θ',
        "iota" => 'ι',
        "kappa" => 'κ',
        "lambda" => 'λ',
        "mu" => 'μ',
        "nu" => 'ν',
        "xi" => 'ξ',
        "omicron" => 'ο',
        "pi" => 'π',
        "rho" => 'ρ',
        "sigma" => 'σ',
        "tau" => 'τ',
        "upsilon" => 'υ',
        "phi" => 'φ',
        "chi" => 'χ',
        "psi" => 'ψ',
        "omega" => 'ω',
        "gammau" => 'Γ',
        "deltau" => 'Δ',
        "thetau" => 'Θ',
        "lambdau" => 'Λ',
        "piu" => 'Π',
        "sigmau" => 'Σ',
        "phiu" => 'Φ',
        "psiu" => 'Ψ',
        "omegau" => 'Ω',
        "deg" => '°',
        "bullet" => '•',
        "sec" => '§',
        "micro" => 'µ',
        "inf" => '∞',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::named_char;

    #[test]
    fn lookups() {
        assert_eq!(named_char("n"), Some('\n'));
        assert_eq!(named_char("pi"), Some('π'));
        assert_eq!(named_char("x263a"), Some('☺'));
        assert_eq!(named_char("nope"), None);
    }
}
