pub mod codes;
pub mod sqlstate;

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::warn;

/// Display name for codes missing from the catalog.
pub const NOT_KNOWN_ERROR: &str = "NOT_KNOWN_ERROR";

/// Code of the fallback entry. Never produced by packing, which is non-negative.
pub const NOT_KNOWN_CODE: i32 = -2;

/// A known error code and its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Packed SQLSTATE.
    pub code: i32,
    pub sqlstate: &'static str,
    pub name: &'static str,
}

static NOT_KNOWN_ENTRY: CatalogEntry = CatalogEntry {
    code: NOT_KNOWN_CODE,
    sqlstate: "",
    name: NOT_KNOWN_ERROR,
};

/// Immutable mapping from packed SQLSTATE to display name.
pub struct ErrorCatalog {
    entries: HashMap<i32, CatalogEntry>,
}

impl ErrorCatalog {
    /// Returns the process-wide catalog, building it on first use.
    pub fn global() -> &'static ErrorCatalog {
        static CATALOG: OnceLock<ErrorCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::build)
    }

    fn build() -> Self {
        let mut entries = HashMap::with_capacity(codes::ERROR_CODES.len());
        for &(state, name) in codes::ERROR_CODES {
            match sqlstate::parse(state) {
                Ok(code) => {
                    entries.insert(
                        code,
                        CatalogEntry {
                            code,
                            sqlstate: state,
                            name,
                        },
                    );
                }
                Err(e) => warn!(error = %e, "skipping malformed catalog entry"),
            }
        }
        Self { entries }
    }

    /// Looks up a packed code, falling back to the `NOT_KNOWN_ERROR` entry.
    pub fn lookup(&self, code: i32) -> &CatalogEntry {
        self.entries.get(&code).unwrap_or(&NOT_KNOWN_ENTRY)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Set of packed codes that are never recorded.
///
/// Kept as a sorted vector: the set is small and `contains` sits on the
/// producer path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    codes: Vec<i32>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from textual codes.
    ///
    /// Malformed entries are logged and skipped. At most as many codes as the
    /// catalog holds are accepted; the excess is dropped with a warning.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for raw in codes {
            let raw = raw.as_ref();
            match sqlstate::parse(raw) {
                Ok(code) => {
                    if !set.exclude(code) && !set.contains(code) {
                        warn!(code = raw, "exclusion list is full, skipping code");
                    }
                }
                Err(e) => warn!(error = %e, "skipping malformed excluded code"),
            }
        }
        set
    }

    /// Maximum number of codes the set accepts.
    pub fn capacity_limit() -> usize {
        ErrorCatalog::global().len()
    }

    /// Adds a packed code. Returns false if it was already present or the
    /// set is full.
    pub fn exclude(&mut self, code: i32) -> bool {
        match self.codes.binary_search(&code) {
            Ok(_) => false,
            Err(pos) => {
                if self.codes.len() >= Self::capacity_limit() {
                    return false;
                }
                self.codes.insert(pos, code);
                true
            }
        }
    }

    #[inline]
    pub fn contains(&self, code: i32) -> bool {
        !self.codes.is_empty() && self.codes.binary_search(&code).is_ok()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Textual form of every excluded code, in packed order.
    pub fn to_sqlstates(&self) -> Vec<String> {
        self.codes.iter().map(|&c| sqlstate::unpack(c)).collect()
    }
}
