mod defillama;

pub use defillama::DefiLlama;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, TimeZone};

// service resolving a point in time to the chain's block height at that time
#[async_trait]
pub trait BlockHeightLookup: Send + Sync {
    /// `None` when the service has no block for the timestamp.
    async fn block_height_at(&self, timestamp: i64) -> Result<Option<u64>>;
}

/// Parses a `DD/MM/YYYY` date. The shape is checked before the calendar, so
/// `1/2/2023` fails on shape and `31/02/2023` on the calendar.
pub fn parse_cutoff_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    let bytes = input.as_bytes();

    let is_shaped = bytes.len() == 10
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| if i == 2 || i == 5 { *b == b'/' } else { b.is_ascii_digit() });

    if !is_shaped {
        bail!("expected a date formatted as DD/MM/YYYY, got {:?}", input);
    }

    NaiveDate::parse_from_str(input, "%d/%m/%Y")
        .map_err(|_| anyhow!("{} is not a calendar date", input))
}

/// Unix timestamp of the start of the day in the local timezone.
pub fn local_midnight_timestamp(date: NaiveDate) -> Result<i64> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("no midnight on {}", date))?;

    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|date_time| date_time.timestamp())
        .ok_or_else(|| anyhow!("midnight of {} does not exist in the local timezone", date))
}
