use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Converts wall-clock values produced under the server zone into the
/// wall clock of a reader's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneShift {
    server: Tz,
    client: Tz,
}

impl ZoneShift {
    pub fn new(server: Tz, client: Tz) -> Self {
        Self { server, client }
    }

    pub fn server(&self) -> Tz {
        self.server
    }

    pub fn client(&self) -> Tz {
        self.client
    }

    /// Wall clock under the client zone.
    pub fn to_client(&self, wall: NaiveDateTime) -> NaiveDateTime {
        self.to_zone(wall, self.client)
    }

    /// Reinterprets `wall` as local to the server zone and re-expresses the
    /// same instant in `zone`. The offset difference is taken at that
    /// instant, so daylight-saving transitions are honoured.
    pub fn to_zone(&self, wall: NaiveDateTime, zone: Tz) -> NaiveDateTime {
        self.instant(wall).with_timezone(&zone).naive_local()
    }

    /// The absolute instant a server wall-clock value denotes.
    pub fn instant(&self, wall: NaiveDateTime) -> DateTime<Utc> {
        localize(self.server, wall)
    }
}

/// Earliest reading for ambiguous (fall-back) times. Times inside a
/// spring-forward gap take the offset in force just before the gap.
fn localize(zone: Tz, wall: NaiveDateTime) -> DateTime<Utc> {
    if let Some(dt) = zone.from_local_datetime(&wall).earliest() {
        return dt.with_timezone(&Utc);
    }
    let hour = TimeDelta::hours(1);
    zone.from_local_datetime(&(wall - hour))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc) + hour)
        .unwrap_or_else(|| Utc.from_utc_datetime(&wall))
}

/// Wall clock of an absolute instant in `zone`.
pub fn instant_in(instant: DateTime<Utc>, zone: Tz) -> NaiveDateTime {
    instant.with_timezone(&zone).naive_local()
}
