//! Spectrum analyzer proxy
//!
//! Wraps a [`SpectrumInstrument`] with the acquisition discipline used by the
//! sweep: the continuous sweep is paused around every measurement and always
//! resumed afterwards, exactly once, whatever happens in between.

use lo_protocol::spectrum::{InputMode, OutputMask};
use lo_protocol::{AutoValue, AveragingMode, Peak, ScanBuffer, ScanWindow, SpectrumCommand};
use tracing::{debug, info, warn};

use crate::error::DeviceError;
use crate::instrument::SpectrumInstrument;

/// Discrete positions requested per peak measurement
pub const DEFAULT_MEASUREMENT_POINTS: u32 = 51;

const DEVICE: &str = "tinySA";

/// Connected spectrum analyzer
pub struct SpectrumProxy<I: SpectrumInstrument> {
    instrument: Option<I>,
    info: String,
}

impl<I: SpectrumInstrument> SpectrumProxy<I> {
    /// Identify the instrument and apply the acquisition defaults
    pub fn connect(mut instrument: I) -> Result<Self, DeviceError> {
        let banner = instrument.execute(&SpectrumCommand::Info)?;
        let info = String::from_utf8_lossy(&banner).trim().to_string();
        info!("tinySA connected: {}", info.lines().next().unwrap_or("<no info>"));

        for command in [
            SpectrumCommand::Mode(InputMode::LowInput),
            SpectrumCommand::Agc(AutoValue::Auto),
            SpectrumCommand::Attenuate(AutoValue::Auto),
            SpectrumCommand::Rbw(AutoValue::Auto),
        ] {
            instrument.execute(&command)?;
        }

        Ok(Self {
            instrument: Some(instrument),
            info,
        })
    }

    /// Banner returned by `info`
    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn is_connected(&self) -> bool {
        self.instrument.is_some()
    }

    /// Underlying instrument, if still connected
    pub fn instrument(&self) -> Option<&I> {
        self.instrument.as_ref()
    }

    /// Resolution bandwidth in kHz, or automatic
    pub fn set_rbw(&mut self, rbw: AutoValue) -> Result<(), DeviceError> {
        debug!("Setting RBW to {}", rbw);
        self.link()?.execute(&SpectrumCommand::Rbw(rbw)).map(drop)
    }

    /// Input attenuation in dB, or automatic
    pub fn set_attenuation(&mut self, attenuation: AutoValue) -> Result<(), DeviceError> {
        debug!("Setting attenuation to {}", attenuation);
        self.link()?
            .execute(&SpectrumCommand::Attenuate(attenuation))
            .map(drop)
    }

    /// Strongest bin in a window around `center_mhz`
    ///
    /// `averaging` outside {1, 4, 16} falls back to no averaging.
    pub fn measure_peak(
        &mut self,
        center_mhz: f64,
        span_mhz: f64,
        points: u32,
        averaging: u32,
    ) -> Result<Peak, DeviceError> {
        let window = ScanWindow::around(center_mhz, span_mhz);
        if !AveragingMode::is_supported_count(averaging) {
            debug!("Averaging {} unsupported, using off", averaging);
        }
        let mode = AveragingMode::from_count(averaging);

        let buffer = {
            let mut acquisition = PausedAcquisition::begin(self.link()?)?;
            acquisition.execute(&SpectrumCommand::Calc(mode))?;
            let frequencies = acquisition.execute(&SpectrumCommand::Hop {
                window,
                points,
                mask: OutputMask::Frequency,
            })?;
            let powers = acquisition.execute(&SpectrumCommand::Hop {
                window,
                points,
                mask: OutputMask::Power,
            })?;
            acquisition.release()?;
            ScanBuffer::from_payloads(&frequencies, &powers)?
        };

        let peak = buffer.peak().ok_or(DeviceError::NoData(DEVICE))?;
        debug!(
            "Peak {:.2} dBm at {:.4} MHz over {} bins",
            peak.power_dbm,
            peak.frequency_mhz,
            buffer.len()
        );
        Ok(peak)
    }

    /// Peak level in a window around `frequency_mhz`
    pub fn measure_power_at(
        &mut self,
        frequency_mhz: f64,
        span_mhz: f64,
        averaging: u32,
    ) -> Result<f64, DeviceError> {
        self.measure_peak(frequency_mhz, span_mhz, DEFAULT_MEASUREMENT_POINTS, averaging)
            .map(|peak| peak.power_dbm)
    }

    /// One continuous sweep between two edges
    pub fn quick_scan(
        &mut self,
        start_mhz: f64,
        stop_mhz: f64,
        points: u32,
    ) -> Result<ScanBuffer, DeviceError> {
        let window = ScanWindow::between(start_mhz, stop_mhz);

        let mut acquisition = PausedAcquisition::begin(self.link()?)?;
        let frequencies = acquisition.execute(&SpectrumCommand::Scan {
            window,
            points,
            mask: OutputMask::Frequency,
        })?;
        let powers = acquisition.execute(&SpectrumCommand::Scan {
            window,
            points,
            mask: OutputMask::Power,
        })?;
        acquisition.release()?;

        let buffer = ScanBuffer::from_payloads(&frequencies, &powers)?;
        if buffer.is_empty() {
            return Err(DeviceError::NoData(DEVICE));
        }
        Ok(buffer)
    }

    /// Restart the continuous sweep and drop the link; idempotent
    pub fn disconnect(&mut self) {
        if let Some(mut instrument) = self.instrument.take() {
            if let Err(e) = instrument.execute(&SpectrumCommand::Resume) {
                warn!("tinySA resume on disconnect failed: {}", e);
            }
            info!("tinySA disconnected");
        }
    }

    fn link(&mut self) -> Result<&mut I, DeviceError> {
        self.instrument.as_mut().ok_or(DeviceError::NotConnected(DEVICE))
    }
}

impl<I: SpectrumInstrument> Drop for SpectrumProxy<I> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Paused continuous sweep; resumes when released or dropped
struct PausedAcquisition<'a, I: SpectrumInstrument> {
    instrument: &'a mut I,
    resumed: bool,
}

impl<'a, I: SpectrumInstrument> PausedAcquisition<'a, I> {
    fn begin(instrument: &'a mut I) -> Result<Self, DeviceError> {
        // Guard exists before the pause so a failed pause still resumes
        let mut guard = Self {
            instrument,
            resumed: false,
        };
        guard.execute(&SpectrumCommand::Pause)?;
        Ok(guard)
    }

    fn execute(&mut self, command: &SpectrumCommand) -> Result<Vec<u8>, DeviceError> {
        self.instrument.execute(command)
    }

    fn resume(&mut self) -> Result<(), DeviceError> {
        if self.resumed {
            return Ok(());
        }
        self.resumed = true;
        self.instrument.execute(&SpectrumCommand::Resume).map(drop)
    }

    fn release(mut self) -> Result<(), DeviceError> {
        self.resume()
    }
}

impl<I: SpectrumInstrument> Drop for PausedAcquisition<'_, I> {
    fn drop(&mut self) {
        if let Err(e) = self.resume() {
            warn!("tinySA resume failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedInstrument;

    const FREQS: &[u8] = b"899500000\r\n900000000\r\n900500000\r\n";
    const POWERS: &[u8] = b"-70.5\r\n-12.25\r\n-40.0\r\n";

    fn proxy_with(acquisitions: Vec<Result<Vec<u8>, DeviceError>>) -> SpectrumProxy<ScriptedInstrument> {
        let mut instrument = ScriptedInstrument::new();
        for reply in acquisitions {
            instrument.acquisition(reply);
        }
        SpectrumProxy::connect(instrument).unwrap()
    }

    fn log(proxy: &SpectrumProxy<ScriptedInstrument>) -> &[String] {
        &proxy.instrument().unwrap().log
    }

    fn resumes(proxy: &SpectrumProxy<ScriptedInstrument>) -> usize {
        proxy.instrument().unwrap().count("resume")
    }

    #[test]
    fn test_connect_applies_defaults() {
        let proxy = proxy_with(vec![]);
        assert_eq!(
            log(&proxy),
            ["info", "mode low input", "agc auto", "attenuate auto", "rbw auto"]
        );
        assert!(proxy.info().starts_with("tinySA ULTRA"));
    }

    #[test]
    fn test_measure_peak_sequence() {
        let mut proxy = proxy_with(vec![Ok(FREQS.to_vec()), Ok(POWERS.to_vec())]);
        let peak = proxy.measure_peak(900.0, 1.0, 51, 4).unwrap();

        assert_eq!(peak.power_dbm, -12.25);
        assert_eq!(peak.frequency_mhz, 900.0);
        assert_eq!(
            &log(&proxy)[5..],
            [
                "pause",
                "calc aver4",
                "hop 899500000 900500000 51 1",
                "hop 899500000 900500000 51 2",
                "resume"
            ]
        );
    }

    #[test]
    fn test_resume_once_on_parse_failure() {
        let mut proxy = proxy_with(vec![Ok(FREQS.to_vec()), Ok(b"-70 garbage -40".to_vec())]);
        let err = proxy.measure_peak(900.0, 1.0, 51, 1).unwrap_err();
        assert!(matches!(err, DeviceError::DataFormat(_)));
        assert_eq!(resumes(&proxy), 1);
    }

    #[test]
    fn test_resume_once_on_command_failure() {
        let mut proxy = proxy_with(vec![
            Ok(FREQS.to_vec()),
            Err(DeviceError::NoData("tinySA")),
        ]);
        assert!(proxy.measure_peak(900.0, 1.0, 51, 1).is_err());
        assert_eq!(resumes(&proxy), 1);
    }

    #[test]
    fn test_resume_once_when_pause_fails() {
        let mut proxy = proxy_with(vec![]);
        if let Some(instrument) = proxy.instrument.as_mut() {
            instrument.failing.push("pause");
        }
        assert!(proxy.measure_peak(900.0, 1.0, 51, 1).is_err());
        assert_eq!(resumes(&proxy), 1);
    }

    #[test]
    fn test_resume_once_on_success() {
        let mut proxy = proxy_with(vec![Ok(FREQS.to_vec()), Ok(POWERS.to_vec())]);
        proxy.measure_peak(900.0, 1.0, 51, 16).unwrap();
        assert_eq!(resumes(&proxy), 1);
    }

    #[test]
    fn test_unsupported_averaging_falls_back_to_off() {
        let mut proxy = proxy_with(vec![Ok(FREQS.to_vec()), Ok(POWERS.to_vec())]);
        assert!(proxy.measure_peak(900.0, 1.0, 51, 7).is_ok());
        assert!(log(&proxy).iter().any(|c| c == "calc off"));
    }

    #[test]
    fn test_empty_acquisition_is_no_data() {
        let mut proxy = proxy_with(vec![Ok(Vec::new()), Ok(Vec::new())]);
        let err = proxy.measure_peak(900.0, 1.0, 51, 1).unwrap_err();
        assert!(matches!(err, DeviceError::NoData(_)));
        assert_eq!(resumes(&proxy), 1);
    }

    #[test]
    fn test_length_mismatch_is_data_format() {
        let mut proxy = proxy_with(vec![Ok(FREQS.to_vec()), Ok(b"-1 -2".to_vec())]);
        let err = proxy.measure_peak(900.0, 1.0, 51, 1).unwrap_err();
        assert!(matches!(err, DeviceError::DataFormat(_)));
    }

    #[test]
    fn test_quick_scan_uses_scan() {
        let mut proxy = proxy_with(vec![Ok(FREQS.to_vec()), Ok(POWERS.to_vec())]);
        let buffer = proxy.quick_scan(899.5, 900.5, 3).unwrap();
        assert_eq!(buffer.len(), 3);
        assert_eq!(log(&proxy)[6], "scan 899500000 900500000 3 1");
        assert_eq!(resumes(&proxy), 1);
    }

    #[test]
    fn test_measure_power_at() {
        let mut proxy = proxy_with(vec![Ok(FREQS.to_vec()), Ok(POWERS.to_vec())]);
        assert_eq!(proxy.measure_power_at(900.0, 1.0, 1).unwrap(), -12.25);
        assert!(log(&proxy).iter().any(|c| c.ends_with(" 51 2")));
    }

    #[test]
    fn test_disconnect_resumes_and_is_idempotent() {
        let mut proxy = proxy_with(vec![]);
        proxy.set_rbw(AutoValue::Fixed(30)).unwrap();
        proxy.set_attenuation(AutoValue::Fixed(10)).unwrap();
        assert_eq!(&log(&proxy)[5..], ["rbw 30", "attenuate 10"]);

        proxy.disconnect();
        proxy.disconnect();
        assert!(!proxy.is_connected());
        assert!(matches!(
            proxy.measure_peak(900.0, 1.0, 51, 1),
            Err(DeviceError::NotConnected("tinySA"))
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn payload(choice: u8) -> Result<Vec<u8>, DeviceError> {
            match choice {
                0 => Ok(FREQS.to_vec()),
                1 => Ok(POWERS.to_vec()),
                2 => Ok(b"nan? 1 2".to_vec()),
                3 => Ok(Vec::new()),
                _ => Err(DeviceError::NoData("tinySA")),
            }
        }

        proptest! {
            #[test]
            fn measure_peak_resumes_exactly_once(
                first in 0u8..5,
                second in 0u8..5,
                averaging in 0u32..32,
            ) {
                let mut proxy = proxy_with(vec![payload(first), payload(second)]);
                let _ = proxy.measure_peak(925.0, 1.0, 51, averaging);
                prop_assert_eq!(resumes(&proxy), 1);
            }
        }
    }
}
