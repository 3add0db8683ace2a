/// A validation failure tied to a single submitted field.
///
/// Form-style callers render these next to the offending field instead of
/// failing the whole request.
pub trait FieldError: std::error::Error {
    /// Name of the submitted field the error belongs to.
    fn field(&self) -> &'static str;
}
