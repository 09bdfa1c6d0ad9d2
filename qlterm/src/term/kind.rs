//! Operator codes of the query language.
//!
//! The numeric values are part of the wire protocol and of every persisted tree; they
//! never change. Display names (`ORDER_BY`, `MAKE_OBJ`, ...) are the ones clients see in
//! error messages.
//!
//! The two classification tables used by the validator are `const fn` matches: they are
//! fixed at compile time and shared by every thread without synchronization.
use strum::{EnumIter, FromRepr, IntoStaticStr};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromRepr, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum TermKind {
    /// A literal value. The only kind that carries a datum instead of children.
    Datum = 1,
    MakeArray = 2,
    /// An object whose values are terms; the names are the node's optargs.
    MakeObj = 3,
    Var = 10,
    Javascript = 11,
    Error = 12,
    ImplicitVar = 13,
    Db = 14,
    Table = 15,
    Get = 16,
    Eq = 17,
    Ne = 18,
    Lt = 19,
    Le = 20,
    Gt = 21,
    Ge = 22,
    Not = 23,
    Add = 24,
    Sub = 25,
    Mul = 26,
    Div = 27,
    Mod = 28,
    Append = 29,
    Slice = 30,
    GetField = 31,
    HasFields = 32,
    Pluck = 33,
    Without = 34,
    Merge = 35,
    BetweenDeprecated = 36,
    Reduce = 37,
    Map = 38,
    Filter = 39,
    ConcatMap = 40,
    OrderBy = 41,
    Distinct = 42,
    Count = 43,
    Union = 44,
    Nth = 45,
    InnerJoin = 48,
    OuterJoin = 49,
    EqJoin = 50,
    CoerceTo = 51,
    TypeOf = 52,
    Update = 53,
    Delete = 54,
    Replace = 55,
    Insert = 56,
    DbCreate = 57,
    DbDrop = 58,
    DbList = 59,
    TableCreate = 60,
    TableDrop = 61,
    TableList = 62,
    Funcall = 64,
    Branch = 65,
    Or = 66,
    And = 67,
    ForEach = 68,
    Func = 69,
    Skip = 70,
    Limit = 71,
    Zip = 72,
    Asc = 73,
    Desc = 74,
    IndexCreate = 75,
    IndexDrop = 76,
    IndexList = 77,
    GetAll = 78,
    Info = 79,
    Prepend = 80,
    Sample = 81,
    InsertAt = 82,
    DeleteAt = 83,
    ChangeAt = 84,
    SpliceAt = 85,
    IsEmpty = 86,
    OffsetsOf = 87,
    SetInsert = 88,
    SetIntersection = 89,
    SetUnion = 90,
    SetDifference = 91,
    Default = 92,
    Contains = 93,
    Keys = 94,
    Difference = 95,
    WithFields = 96,
    Match = 97,
    Json = 98,
    #[strum(serialize = "ISO8601")]
    Iso8601 = 99,
    #[strum(serialize = "TO_ISO8601")]
    ToIso8601 = 100,
    EpochTime = 101,
    ToEpochTime = 102,
    Now = 103,
    InTimezone = 104,
    During = 105,
    Date = 106,
    Monday = 107,
    Tuesday = 108,
    Wednesday = 109,
    Thursday = 110,
    Friday = 111,
    Saturday = 112,
    Sunday = 113,
    January = 114,
    February = 115,
    March = 116,
    April = 117,
    May = 118,
    June = 119,
    July = 120,
    August = 121,
    September = 122,
    October = 123,
    November = 124,
    December = 125,
    TimeOfDay = 126,
    Timezone = 127,
    Year = 128,
    Month = 129,
    Day = 130,
    DayOfWeek = 131,
    DayOfYear = 132,
    Hours = 133,
    Minutes = 134,
    Seconds = 135,
    Time = 136,
    Literal = 137,
    Sync = 138,
    IndexStatus = 139,
    IndexWait = 140,
    Upcase = 141,
    Downcase = 142,
    Object = 143,
    Group = 144,
    Sum = 145,
    Avg = 146,
    Min = 147,
    Max = 148,
    Split = 149,
    Ungroup = 150,
    Random = 151,
    Changes = 152,
    Http = 153,
    Args = 154,
    Binary = 155,
    IndexRename = 156,
    Geojson = 157,
    ToGeojson = 158,
    Point = 159,
    Line = 160,
    Polygon = 161,
    Distance = 162,
    Intersects = 163,
    Includes = 164,
    Circle = 165,
    GetIntersecting = 166,
    Fill = 167,
    GetNearest = 168,
    Uuid = 169,
    Bracket = 170,
    PolygonSub = 171,
    ToJsonString = 172,
    Range = 173,
    Config = 174,
    Status = 175,
    Reconfigure = 176,
    Wait = 177,
    Rebalance = 179,
    Minval = 180,
    Maxval = 181,
    Between = 182,
    Floor = 183,
    Ceil = 184,
    Round = 185,
    Values = 186,
    Fold = 187,
    Grant = 188,
    SetWriteHook = 189,
    GetWriteHook = 190,
    BitAnd = 191,
    BitOr = 192,
    BitXor = 193,
    BitNot = 194,
    BitSal = 195,
    BitSar = 196,
}

impl TermKind {
    /// Look up a kind from its wire code.
    #[inline]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::from_repr(code)
    }

    /// Look up a kind from a document number; non-integral values never name a kind.
    pub fn from_number(value: f64) -> Option<Self> {
        if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
            return None;
        }
        Self::from_repr(value as i32)
    }

    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Writes and cluster metadata operations. These may not run inside the
    /// function arguments of stream operations.
    pub const fn is_write_or_meta(self) -> bool {
        matches!(
            self,
            TermKind::Update
                | TermKind::Delete
                | TermKind::Insert
                | TermKind::Replace
                | TermKind::DbCreate
                | TermKind::DbDrop
                | TermKind::TableCreate
                | TermKind::TableDrop
                | TermKind::Wait
                | TermKind::Reconfigure
                | TermKind::Rebalance
                | TermKind::Sync
                | TermKind::Grant
                | TermKind::IndexCreate
                | TermKind::IndexDrop
                | TermKind::IndexWait
                | TermKind::IndexRename
                | TermKind::SetWriteHook
        )
    }

    /// Stream operations whose arguments past the 0th may not contain writes.
    pub const fn forbids_writes(self) -> bool {
        matches!(
            self,
            TermKind::Reduce
                | TermKind::Map
                | TermKind::Fold
                | TermKind::Filter
                | TermKind::ConcatMap
                | TermKind::Group
                | TermKind::InnerJoin
                | TermKind::OuterJoin
                | TermKind::EqJoin
                | TermKind::Update
                | TermKind::Delete
                | TermKind::Replace
                | TermKind::Insert
                | TermKind::Count
                | TermKind::Sum
                | TermKind::Avg
                | TermKind::Min
                | TermKind::Max
        )
    }

    /// `ASC` and `DESC`, which only make sense directly under `ORDER_BY`.
    pub const fn is_ordering(self) -> bool {
        matches!(self, TermKind::Asc | TermKind::Desc)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in TermKind::iter() {
            assert_eq!(TermKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(TermKind::from_code(47), None);
        assert_eq!(TermKind::from_code(178), None);
        assert_eq!(TermKind::from_number(41.0), Some(TermKind::OrderBy));
        assert_eq!(TermKind::from_number(41.5), None);
    }

    #[test]
    fn display_names() {
        assert_eq!(TermKind::OrderBy.name(), "ORDER_BY");
        assert_eq!(TermKind::MakeObj.name(), "MAKE_OBJ");
        assert_eq!(TermKind::Asc.name(), "ASC");
        assert_eq!(TermKind::ToIso8601.name(), "TO_ISO8601");
    }

    #[test]
    fn classification_tables() {
        assert!(TermKind::Update.is_write_or_meta());
        assert!(TermKind::IndexCreate.is_write_or_meta());
        assert!(!TermKind::Map.is_write_or_meta());
        assert!(TermKind::Map.forbids_writes());
        assert!(!TermKind::ForEach.forbids_writes());
        assert!(TermKind::Desc.is_ordering());
    }
}
