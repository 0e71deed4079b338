use crate::log::{error_name_reference, Error};
use rustc_hash::FxHashMap;

/// The ordered table of strings that scope names, kinds, variables and
/// binding values are stored in.
///
/// Interning a string that is already present returns its existing index,
/// so the table only ever grows by strings it has not seen.
///
/// # Examples
///
/// ```
/// use scopemap::NameTable;
///
/// let mut names = NameTable::from_names(vec!["foo".to_string()]);
///
/// assert_eq!(names.intern("bar"), 1);
/// assert_eq!(names.intern("foo"), 0);
/// assert_eq!(names.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: Vec<String>,
    index: FxHashMap<String, usize>,
}

impl NameTable {
    /// Create a new, empty NameTable.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a NameTable from the `names` array of an existing map.
    ///
    /// The array is kept as is. When it holds duplicates, each string
    /// resolves to its first occurrence.
    pub fn from_names(names: Vec<String>) -> Self {
        let mut index = FxHashMap::default();
        for (position, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(position);
        }

        Self { names, index }
    }

    /// Return the index of `name`, appending it when it is not yet present.
    pub fn intern(&mut self, name: &str) -> usize {
        if let Some(&position) = self.index.get(name) {
            return position;
        }
        let position = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), position);

        position
    }

    /// Return the string at `index`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] of kind `InvalidNameReference` when `index` is
    /// out of bounds.
    pub fn get(&self, index: u64) -> Result<&str, Error> {
        usize::try_from(index)
            .ok()
            .and_then(|position| self.names.get(position))
            .map(String::as_str)
            .ok_or_else(|| error_name_reference(index, self.names.len()))
    }

    /// Return the number of strings in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Return true if the table holds no strings.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Return the strings in index order.
    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    /// Consume the table and return the strings in index order.
    #[inline]
    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

#[cfg(test)]
mod tests {
    use super::NameTable;
    use crate::ErrorKind;

    #[test]
    fn test_intern_deduplicates() {
        let mut names = NameTable::new();

        assert_eq!(names.intern("x"), 0);
        assert_eq!(names.intern("y"), 1);
        assert_eq!(names.intern("x"), 0);
        assert_eq!(names.as_slice(), ["x", "y"]);
    }

    #[test]
    fn test_duplicates_resolve_to_first_occurrence() {
        let mut names =
            NameTable::from_names(vec!["a".to_string(), "b".to_string(), "a".to_string()]);

        assert_eq!(names.intern("a"), 0);
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_empty_string_is_a_name() {
        let mut names = NameTable::new();

        assert_eq!(names.intern(""), 0);
        assert_eq!(names.get(0).unwrap(), "");
    }

    #[test]
    fn test_get_out_of_bounds() {
        let names = NameTable::from_names(vec!["a".to_string()]);
        let error = names.get(1).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidNameReference);
        assert_eq!(error.reason(), "name index 1 is out of bounds");
    }

    #[test]
    fn test_into_names_keeps_order() {
        let mut names = NameTable::from_names(vec!["kept".to_string()]);
        names.intern("new");

        assert_eq!(names.into_names(), vec!["kept", "new"]);
    }
}
