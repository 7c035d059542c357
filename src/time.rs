use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Local, NaiveDateTime, Utc};

/// Zone used to render timestamps.
///
/// Uses chrono-tz when a zone is configured; falls back to local time otherwise.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    Local,
    Zone(chrono_tz::Tz),
}

impl Clock {
    pub fn from_tz(tz: Option<&str>) -> Result<Self> {
        match tz {
            None => Ok(Clock::Local),
            Some(tz) => {
                let tz: chrono_tz::Tz = tz.parse().map_err(|_| anyhow!("invalid tz: {tz}"))?;
                Ok(Clock::Zone(tz))
            }
        }
    }

    fn localize(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Clock::Local => utc.with_timezone(&Local).naive_local(),
            Clock::Zone(tz) => utc.with_timezone(tz).naive_local(),
        }
    }

    /// Current wall time, `YYYY-MM-DDTHH:MM:SS.ffffff` without offset.
    pub fn now_iso(&self) -> String {
        self.localize(Utc::now())
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string()
    }

    /// Epoch seconds to an ISO-8601 local date-time.
    ///
    /// Microseconds are appended only when the epoch has a fractional part.
    pub fn iso_from_epoch(&self, secs: f64) -> Option<String> {
        if !secs.is_finite() {
            return None;
        }
        let whole = secs.floor();
        let micros = ((secs - whole) * 1_000_000.0).round() as u32;
        let (whole, micros) = if micros >= 1_000_000 {
            (whole + 1.0, 0)
        } else {
            (whole, micros)
        };
        if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
            return None;
        }
        let utc = DateTime::<Utc>::from_timestamp(whole as i64, micros * 1_000)?;
        let local = self.localize(utc);
        if !(1..=9999).contains(&local.year()) {
            return None;
        }
        let rendered = if micros == 0 {
            local.format("%Y-%m-%dT%H:%M:%S").to_string()
        } else {
            local.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
        };
        Some(rendered)
    }
}
