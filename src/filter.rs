use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use tracing::{info, warn};

use crate::containers::ContainerRecord;
use crate::error::AppError;
use crate::Result;

pub const NAME_COLUMN: &str = "container_name";
pub const ID_COLUMN: &str = "container_id";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterMode {
    #[default]
    Unfiltered,
    ByName,
    ById,
}

impl FilterMode {
    fn for_column(column: &str) -> Self {
        if column.ends_with("id") {
            FilterMode::ById
        } else {
            FilterMode::ByName
        }
    }
}

/// Where the allowed identifiers come from inside a CSV source.
#[derive(Clone, Copy, Debug)]
pub enum Column<'a> {
    /// The header must carry this column.
    Named(&'a str),
    /// Use a `container_name` or `container_id` header when there is one,
    /// otherwise read the first column of a headerless file.
    Auto,
}

/// An allow-list of container ids and names. An empty list lets every
/// container through.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MembershipFilter {
    mode: FilterMode,
    allowed: BTreeSet<String>,
}

impl MembershipFilter {
    pub fn new<I, S>(mode: FilterMode, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed = values.into_iter().map(Into::into).collect::<BTreeSet<_>>();
        let mode = if allowed.is_empty() {
            FilterMode::Unfiltered
        } else {
            mode
        };

        MembershipFilter {
            mode,
            allowed,
        }
    }

    /// Parses a CSV source. Rows that can't be read, are too short, or hold an
    /// empty value are skipped with a warning.
    ///
    /// # Errors
    ///
    /// - When `column` is [`Column::Named`] and the header lacks that column.
    pub fn load<R: Read>(source: R, column: Column<'_>) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(source);
        let mut records = reader.records();

        let header = match records.next() {
            Some(Ok(header)) => header,
            Some(Err(err)) => return Err(AppError::MalformedFilterSource(err.to_string())),
            None => return Ok(MembershipFilter::default()),
        };

        let position = |name: &str| header.iter().position(|field| field == name);

        let (index, mode, first) = match column {
            Column::Named(name) => {
                let index = position(name).ok_or_else(|| {
                    AppError::MalformedFilterSource(format!("header has no {} column", name))
                })?;

                (index, FilterMode::for_column(name), None)
            },
            Column::Auto => {
                if let Some(index) = position(NAME_COLUMN) {
                    (index, FilterMode::ByName, None)
                } else if let Some(index) = position(ID_COLUMN) {
                    (index, FilterMode::ById, None)
                } else {
                    (0, FilterMode::ByName, Some(header))
                }
            },
        };

        let mut allowed = BTreeSet::new();
        let mut skipped = 0usize;

        for (row, record) in first.into_iter().map(Ok).chain(records).enumerate() {
            match value_at(record, index) {
                Ok(value) => {
                    allowed.insert(value);
                },
                Err(reason) => {
                    skipped += 1;
                    warn!("Skipping filter row {}: {}.", row + 1, reason);
                },
            }
        }

        if skipped > 0 {
            warn!("Skipped {} malformed filter rows.", skipped);
        }

        Ok(MembershipFilter::new(mode, allowed))
    }

    /// Reads the filter file at `path`. Any failure leaves the service
    /// unfiltered instead of aborting.
    pub fn load_file(path: &Path, column: Option<&str>) -> Self {
        let column = column.map_or(Column::Auto, Column::Named);
        let filter = File::open(path)
            .map_err(AppError::from)
            .and_then(|file| MembershipFilter::load(file, column));

        match filter {
            Ok(filter) => {
                info!(
                    "Loaded {} filter entries ({:?}) from {}.",
                    filter.len(),
                    filter.mode(),
                    path.display()
                );
                filter
            },
            Err(err) => {
                warn!(
                    "Couldn't load filter from {}: {}. Showing all containers.",
                    path.display(),
                    err
                );
                MembershipFilter::default()
            },
        }
    }

    pub fn is_allowed(&self, container: &ContainerRecord) -> bool {
        self.allowed.is_empty()
            || self.allowed.contains(&container.id)
            || self.allowed.contains(&container.name)
    }

    /// Entries that match none of `containers`.
    pub fn unmatched<'a>(&'a self, containers: &[ContainerRecord]) -> Vec<&'a str> {
        self.allowed
            .iter()
            .filter(|entry| !containers.iter().any(|c| &c.id == *entry || &c.name == *entry))
            .map(String::as_str)
            .collect()
    }

    #[inline]
    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}

fn value_at(
    record: csv::Result<StringRecord>,
    index: usize,
) -> std::result::Result<String, String> {
    let record = record.map_err(|err| err.to_string())?;

    match record.get(index) {
        Some("") => Err(String::from("empty value")),
        Some(value) => Ok(value.to_owned()),
        None => Err(format!("row has no column {}", index + 1)),
    }
}

/// The active filter. Readers take a snapshot and never see a replacement
/// half-applied.
#[derive(Debug, Default)]
pub struct FilterStore {
    current: ArcSwap<MembershipFilter>,
}

impl FilterStore {
    pub fn new(filter: MembershipFilter) -> Self {
        FilterStore {
            current: ArcSwap::from_pointee(filter),
        }
    }

    #[inline]
    pub fn current(&self) -> Arc<MembershipFilter> {
        self.current.load_full()
    }

    /// Swaps in `filter`, returning the one it replaced.
    pub fn replace(&self, filter: MembershipFilter) -> Arc<MembershipFilter> {
        self.current.swap(Arc::new(filter))
    }

    /// Re-reads the filter file at `path` and swaps it in. A file that is gone
    /// or unreadable leaves the service unfiltered.
    pub fn reload(&self, path: &Path, column: Option<&str>) -> Arc<MembershipFilter> {
        self.replace(MembershipFilter::load_file(path, column))
    }
}
