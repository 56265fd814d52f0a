/// Sole member of a back-reference object; its value is the negated reference id.
pub(crate) const REF_MEMBER: &str = "*i";
/// Leading member of every object body.
pub(crate) const TYPE_ID_MEMBER: &str = "_typeId";
/// Holds the items of a sequence written where only an erased type is known.
pub(crate) const ITEMS_MEMBER: &str = "_items";

/// Dates are written in UTC with millisecond precision.
pub(crate) const DATE_WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
/// Tried first on read; accepts any number of fraction digits.
pub(crate) const DATE_EXACT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
/// Tried in order after RFC 3339.
pub(crate) const DATE_NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
pub(crate) const DATE_ONLY_FORMAT: &str = "%Y-%m-%d";

/// Binary tag of an absent composite.
pub(crate) const TAG_NULL: i32 = 0;
/// Binary encoding of an absent date.
pub(crate) const NO_DATE: i64 = i64::min_value();
