use crate::interp::RuntimeError;
use crate::obj::number::Number;

/// A list known to contain only numbers. Operator dispatch routes
/// numeric operators over these elementwise, broadcasting scalars.
#[derive(Debug, Clone, Default)]
pub struct NumberList(Vec<Number>);

type BinOp = fn(&Number, &Number) -> Result<Number, RuntimeError>;

impl NumberList {
    pub fn new(items: Vec<Number>) -> NumberList {
        NumberList(items)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn items(&self) -> &[Number] {
        &self.0
    }

    pub fn items_mut(&mut self) -> &mut Vec<Number> {
        &mut self.0
    }

    pub fn push(&mut self, n: Number) {
        self.0.push(n);
    }

    /// `1 2 .. n` inclusive.
    pub fn range_to(n: i64) -> NumberList {
        NumberList((1..=n).map(Number::Int).collect())
    }

    /// Elementwise `f(elem, scalar)`.
    pub fn with_scalar_rhs(&self, n: &Number, f: BinOp) -> Result<NumberList, RuntimeError> {
        self.0
            .iter()
            .map(|x| f(x, n))
            .collect::<Result<Vec<_>, _>>()
            .map(NumberList)
    }

    /// Elementwise `f(scalar, elem)`.
    pub fn with_scalar_lhs(&self, n: &Number, f: BinOp) -> Result<NumberList, RuntimeError> {
        self.0
            .iter()
            .map(|x| f(n, x))
            .collect::<Result<Vec<_>, _>>()
            .map(NumberList)
    }

    /// Elementwise over two lists of the same length.
    pub fn zip_with(&self, other: &NumberList, f: BinOp) -> Result<NumberList, RuntimeError> {
        if self.len() != other.len() {
            return Err(RuntimeError::Value(format!(
                "list length mismatch: {} vs {}",
                self.len(),
                other.len()
            )));
        }
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| f(a, b))
            .collect::<Result<Vec<_>, _>>()
            .map(NumberList)
    }

    /// Ascending sort; complex elements keep their relative order.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| {
            a.num_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    pub fn reverse(&mut self) {
        self.0.reverse();
    }

    pub fn list_eq(&self, other: &NumberList) -> bool {
        self.len() == other.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| a.num_eq(b))
    }
}

impl std::fmt::Display for NumberList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, n) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{n}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::number::Number::*;

    fn ints(v: &[i64]) -> NumberList {
        NumberList::new(v.iter().copied().map(Int).collect())
    }

    #[test]
    fn scalar_broadcast_both_sides() {
        let l = ints(&[1, 2, 3]);
        let r = l.with_scalar_rhs(&Int(10), Number::mul).unwrap();
        assert!(r.list_eq(&ints(&[10, 20, 30])));
        let r = l.with_scalar_lhs(&Int(10), Number::sub).unwrap();
        assert!(r.list_eq(&ints(&[9, 8, 7])));
    }

    #[test]
    fn zip_with_matching_lengths() {
        let a = ints(&[1, 2, 3]);
        let b = ints(&[4, 5, 6]);
        assert!(a.zip_with(&b, Number::add).unwrap().list_eq(&ints(&[5, 7, 9])));
    }

    #[test]
    fn zip_with_length_mismatch_errors() {
        let a = ints(&[1, 2]);
        let b = ints(&[1, 2, 3]);
        assert!(a.zip_with(&b, Number::add).is_err());
    }

    #[test]
    fn range_is_inclusive() {
        let r = NumberList::range_to(5);
        assert!(r.list_eq(&ints(&[1, 2, 3, 4, 5])));
        assert!(NumberList::range_to(0).is_empty());
    }

    #[test]
    fn sort_ascending() {
        let mut l = ints(&[3, 1, 2]);
        l.sort();
        assert!(l.list_eq(&ints(&[1, 2, 3])));
    }

    #[test]
    fn display() {
        assert_eq!(ints(&[1, 2, 3]).to_string(), "[1 2 3]");
    }
}
