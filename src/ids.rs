//! Stable identifiers and the per-installation identity allocator.
//!
//! A [`StableId`] names a derived entity across runs. Identifiers below
//! [`StableId::RUNTIME_BASE`] belong to datasets and are not portable between
//! installations, so persisted locators for them use the
//! `<dataset>~<local id>` composite form instead of the bare hex value.
//!
//! The [`IdAllocator`] issues fresh runtime identifiers above
//! [`IdAllocator::OFFSET_BASE`], shifted by a per-installation offset learned
//! from previously persisted data so that re-runs keep handing out the same
//! range they did before.

use serde::{Deserialize, Serialize};

use crate::error::{ForgeResult, LocatorError};
use crate::store::{MappingStore, SECTION_FUSION, SECTION_SCROLLS, SECTION_VERSION};

/// A 32-bit identifier naming a derived entity across runs.
///
/// Once persisted, an identifier is never silently reassigned to a different
/// logical derivation; collisions with live entities are resolved by swapping
/// the two identifiers, never by orphaning one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
pub struct StableId(pub u32);

impl StableId {
    /// Identifiers at or above this value are runtime-created and portable;
    /// below it they are dataset-relative and shift between installations.
    pub const RUNTIME_BASE: u32 = 0xFF00_0000;

    /// The null identifier, meaning "not yet assigned".
    pub const NULL: StableId = StableId(0);

    /// Parse the persisted hex form (`0x` followed by hex digits).
    pub fn parse_hex(input: &str) -> ForgeResult<Self> {
        let digits = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .ok_or_else(|| LocatorError::BadHex {
                input: input.to_string(),
            })?;
        let raw = u32::from_str_radix(digits, 16).map_err(|_| LocatorError::BadHex {
            input: input.to_string(),
        })?;
        Ok(StableId(raw))
    }

    /// Whether this identifier lives in a dataset's local range and must be
    /// persisted as a `<dataset>~<local>` composite locator.
    pub fn is_dataset_relative(self) -> bool {
        self.0 < Self::RUNTIME_BASE
    }

    /// Whether this identifier has been assigned at all.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for StableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// A persisted reference to an entity: either a bare stable identifier
/// (portable, runtime range) or a dataset-name + local-ordinal composite
/// (survives cross-session renumbering of dataset-relative identifiers).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Stable(StableId),
    Dataset { dataset: String, local_id: u32 },
}

impl Locator {
    /// Parse the persisted form: `<dataset>~0x<hex>` or `0x<hex>`.
    pub fn parse(input: &str) -> ForgeResult<Self> {
        match input.split_once('~') {
            Some((dataset, local)) => {
                if dataset.is_empty() {
                    return Err(LocatorError::Malformed {
                        input: input.to_string(),
                    }
                    .into());
                }
                let local_id = StableId::parse_hex(local)
                    .map_err(|_| LocatorError::Malformed {
                        input: input.to_string(),
                    })?
                    .0;
                Ok(Locator::Dataset {
                    dataset: dataset.to_string(),
                    local_id,
                })
            }
            None => {
                let id = StableId::parse_hex(input)?;
                if id.is_null() {
                    return Err(LocatorError::Malformed {
                        input: input.to_string(),
                    }
                    .into());
                }
                Ok(Locator::Stable(id))
            }
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Stable(id) => write!(f, "{id}"),
            Locator::Dataset { dataset, local_id } => {
                write!(f, "{dataset}~0x{local_id:08X}")
            }
        }
    }
}

/// Monotonic, offset-based allocator for runtime stable identifiers.
///
/// Allocation never fails; collisions against identifiers consumed by entities
/// created after detection are the caller's to resolve via identifier swap.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    offset: u32,
    use_offset: bool,
    counter: u32,
}

impl IdAllocator {
    /// Base of the runtime allocation range. The per-installation offset is
    /// stored in the bits below this mask.
    pub const OFFSET_BASE: u32 = 0xFF07_0000;

    /// An allocator with offset allocation disabled (legacy data detected).
    pub fn disabled() -> Self {
        Self {
            offset: 0,
            use_offset: false,
            counter: 0,
        }
    }

    /// Scan persisted `SCROLLS` values and `FUSION` keys to derive the
    /// per-installation base offset.
    ///
    /// If the maximum identifier seen is non-zero but below
    /// [`Self::OFFSET_BASE`], the data predates offset allocation; offset mode
    /// is disabled for this run and nothing re-enables it until a later run
    /// sees upgraded data. Otherwise the offset is the maximum with the base
    /// bits masked out, and the schema version floor is raised to 3.
    pub fn detect(store: &mut MappingStore) -> Self {
        let mut max_seen: u32 = 0;
        for (_key, value) in store.all_pairs(SECTION_SCROLLS) {
            if let Ok(id) = StableId::parse_hex(&value) {
                max_seen = max_seen.max(id.0);
            }
        }
        for (key, _value) in store.all_pairs(SECTION_FUSION) {
            if let Ok(id) = StableId::parse_hex(&key) {
                max_seen = max_seen.max(id.0);
            }
        }

        if max_seen > 0 && max_seen < Self::OFFSET_BASE {
            tracing::info!("legacy identifier format detected; offset allocation disabled");
            return Self::disabled();
        }

        if store.get_long(SECTION_VERSION, "Version") < 3 {
            store.set_long(SECTION_VERSION, "Version", 3, None);
        }

        let offset = max_seen & !Self::OFFSET_BASE;
        tracing::info!(offset = format_args!("0x{offset:08X}"), "offset allocation active");
        Self {
            offset,
            use_offset: true,
            counter: 0,
        }
    }

    /// Whether offset-based allocation is active for this installation.
    pub fn use_offset(&self) -> bool {
        self.use_offset
    }

    /// Issue the next runtime identifier. Never repeats within a process.
    pub fn next(&mut self) -> StableId {
        self.counter += 1;
        StableId(Self::OFFSET_BASE + self.counter + self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_roundtrip() {
        let id = StableId::parse_hex("0xFF070001").unwrap();
        assert_eq!(id.0, 0xFF07_0001);
        assert_eq!(id.to_string(), "0xFF070001");
    }

    #[test]
    fn parse_rejects_non_hex() {
        assert!(StableId::parse_hex("FF070001").is_err());
        assert!(StableId::parse_hex("0xZZZ").is_err());
        assert!(StableId::parse_hex("").is_err());
    }

    #[test]
    fn dataset_relative_threshold() {
        assert!(StableId(0x0001_A2B3).is_dataset_relative());
        assert!(StableId(0xFEFF_FFFF).is_dataset_relative());
        assert!(!StableId(0xFF00_0000).is_dataset_relative());
        assert!(!StableId(0xFF07_0001).is_dataset_relative());
    }

    #[test]
    fn detect_empty_store_enables_offset_zero() {
        let mut store = MappingStore::new();
        let mut alloc = IdAllocator::detect(&mut store);
        assert!(alloc.use_offset());
        assert_eq!(alloc.next(), StableId(IdAllocator::OFFSET_BASE + 1));
        assert_eq!(alloc.next(), StableId(IdAllocator::OFFSET_BASE + 2));
        // Detection raises the schema version floor.
        assert_eq!(store.get_long(SECTION_VERSION, "Version"), 3);
    }

    #[test]
    fn detect_legacy_data_disables_offset() {
        let mut store = MappingStore::new();
        store.set(SECTION_SCROLLS, "core.esm~0x01", "0x0E000005", None);
        let alloc = IdAllocator::detect(&mut store);
        assert!(!alloc.use_offset());
        // Disabled mode does not touch the version.
        assert_eq!(store.get_long(SECTION_VERSION, "Version"), 0);
    }

    #[test]
    fn detect_resumes_past_persisted_maximum() {
        let mut store = MappingStore::new();
        store.set(SECTION_SCROLLS, "core.esm~0x01", "0xFF070005", None);
        store.set(SECTION_FUSION, "0xFF07000A", "0xFF070001+0xFF070002", None);
        let mut alloc = IdAllocator::detect(&mut store);
        assert!(alloc.use_offset());
        // Offset is the max with the base bits masked out.
        assert_eq!(alloc.next(), StableId(IdAllocator::OFFSET_BASE + 1 + 0x0A));
    }

    #[test]
    fn locator_parse_and_display() {
        let bare = Locator::parse("0xFF070003").unwrap();
        assert_eq!(bare, Locator::Stable(StableId(0xFF07_0003)));
        assert_eq!(bare.to_string(), "0xFF070003");

        let composite = Locator::parse("core.esm~0x000000A1").unwrap();
        assert_eq!(
            composite,
            Locator::Dataset {
                dataset: "core.esm".into(),
                local_id: 0xA1,
            }
        );
        assert_eq!(composite.to_string(), "core.esm~0x000000A1");
    }

    #[test]
    fn locator_rejects_malformed_input() {
        assert!(Locator::parse("~0x01").is_err());
        assert!(Locator::parse("core.esm~bogus").is_err());
        assert!(Locator::parse("0x00000000").is_err());
        assert!(Locator::parse("nonsense").is_err());
    }

    #[test]
    fn allocation_is_monotonic() {
        let mut store = MappingStore::new();
        let mut alloc = IdAllocator::detect(&mut store);
        let a = alloc.next();
        let b = alloc.next();
        let c = alloc.next();
        assert!(a < b && b < c);
    }
}
