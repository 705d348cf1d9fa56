//! Rate-limit attribute value construction
//!
//! RouterOS consumes bandwidth caps as a single `Mikrotik-Rate-Limit` string:
//! `rx/tx` in bits per second, optionally followed by burst rate, burst
//! threshold, and burst time groups. Upload (received by the NAS) always
//! comes first in each group.

/// Bits per second in one advertised megabit
pub const BPS_PER_MBPS: u64 = 1_000_000;

/// Burst time applied when the package does not set one
pub const DEFAULT_BURST_SECONDS: u32 = 8;

/// Convert an advertised Mbps figure to bits per second
pub fn mbps_to_bps(mbps: u32) -> u64 {
    u64::from(mbps) * BPS_PER_MBPS
}

/// Burst parameters of a rate limit, all in bits per second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    pub upload_bps: u64,
    pub download_bps: u64,
    pub threshold_upload_bps: u64,
    pub threshold_download_bps: u64,
    pub duration_secs: u32,
}

/// A NAS-facing rate limit: base rates plus optional burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub upload_bps: u64,
    pub download_bps: u64,
    pub burst: Option<Burst>,
}

impl RateLimit {
    /// Base rate limit from package speeds in Mbps
    pub fn from_mbps(upload_mbps: u32, download_mbps: u32) -> Self {
        RateLimit {
            upload_bps: mbps_to_bps(upload_mbps),
            download_bps: mbps_to_bps(download_mbps),
            burst: None,
        }
    }

    /// Attach burst parameters, filling in defaults the package omits
    ///
    /// Thresholds default to 80% of the corresponding base rate; burst
    /// duration defaults to [`DEFAULT_BURST_SECONDS`].
    pub fn with_burst_mbps(
        mut self,
        burst_upload_mbps: u32,
        burst_download_mbps: u32,
        threshold_upload_mbps: Option<u32>,
        threshold_download_mbps: Option<u32>,
        duration_secs: Option<u32>,
    ) -> Self {
        let threshold_upload_bps = threshold_upload_mbps
            .map(mbps_to_bps)
            .unwrap_or(self.upload_bps * 8 / 10);
        let threshold_download_bps = threshold_download_mbps
            .map(mbps_to_bps)
            .unwrap_or(self.download_bps * 8 / 10);

        self.burst = Some(Burst {
            upload_bps: mbps_to_bps(burst_upload_mbps),
            download_bps: mbps_to_bps(burst_download_mbps),
            threshold_upload_bps,
            threshold_download_bps,
            duration_secs: duration_secs.unwrap_or(DEFAULT_BURST_SECONDS),
        });
        self
    }
}

impl std::fmt::Display for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.upload_bps, self.download_bps)?;
        if let Some(burst) = &self.burst {
            write!(
                f,
                " {}/{} {}/{} {}/{}",
                burst.upload_bps,
                burst.download_bps,
                burst.threshold_upload_bps,
                burst.threshold_download_bps,
                burst.duration_secs,
                burst.duration_secs,
            )?;
        }
        Ok(())
    }
}
