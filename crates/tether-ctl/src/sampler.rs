use tether_link::{Link, LinkError};
use tether_proto::telemetry::TelemetrySample;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LivenessFailure {
    #[error("probe failed: {0}")]
    Transport(#[from] LinkError),
    /// The vehicle answers 0% battery when its telemetry is not up yet.
    #[error("implausible battery reading: {0}%")]
    Implausible(i32),
}

/// Polls the vehicle once. Battery doubles as the liveness probe; height is
/// only read once the probe answered.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetrySampler;

impl TelemetrySampler {
    pub async fn sample(&self, link: &mut dyn Link) -> Result<TelemetrySample, LivenessFailure> {
        let battery_pct = link.battery().await?;
        if battery_pct <= 0 {
            return Err(LivenessFailure::Implausible(battery_pct));
        }
        let height_cm = link.height().await?;
        debug!(battery_pct, height_cm, "sampled");
        Ok(TelemetrySample::new(height_cm, battery_pct))
    }
}
