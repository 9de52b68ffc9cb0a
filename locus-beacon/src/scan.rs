//! Scan window accumulation
//!
//! Raw sightings arrive as text lines, `<mac> <rssi> [name]`, typically
//! piped from a BLE scanner. A window averages every device's samples.

use std::collections::HashMap;

use locus_common::telemetry::DeviceSighting;
use locus_common::{Error, Result};

/// One raw advertisement
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub mac_address: String,
    pub rssi: f64,
    pub name: Option<String>,
}

/// Parse `<mac> <rssi> [name]`; the name may contain spaces
pub fn parse_sighting_line(line: &str) -> Result<Sighting> {
    let line = line.trim();
    let mut parts = line.splitn(3, char::is_whitespace);

    let mac_address = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidInput("empty sighting line".to_string()))?;
    let rssi_text = parts
        .next()
        .ok_or_else(|| Error::InvalidInput(format!("missing RSSI in '{}'", line)))?;
    let rssi: f64 = rssi_text
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("invalid RSSI '{}'", rssi_text)))?;
    if !rssi.is_finite() {
        return Err(Error::InvalidInput(format!("invalid RSSI '{}'", rssi_text)));
    }
    let name = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Sighting {
        mac_address: mac_address.to_string(),
        rssi,
        name,
    })
}

#[derive(Debug)]
struct Samples {
    mac_address: String,
    name: Option<String>,
    sum: f64,
    count: u32,
}

/// Per-device RSSI samples for one window, in first-seen order
#[derive(Debug, Default)]
pub struct ScanAccumulator {
    devices: Vec<Samples>,
    index: HashMap<String, usize>,
}

impl ScanAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sighting: Sighting) {
        let slot = match self.index.get(&sighting.mac_address) {
            Some(&slot) => slot,
            None => {
                let slot = self.devices.len();
                self.index.insert(sighting.mac_address.clone(), slot);
                self.devices.push(Samples {
                    mac_address: sighting.mac_address,
                    name: None,
                    sum: 0.0,
                    count: 0,
                });
                slot
            }
        };

        let samples = &mut self.devices[slot];
        samples.sum += sighting.rssi;
        samples.count += 1;
        if sighting.name.is_some() {
            samples.name = sighting.name;
        }
    }

    /// Number of distinct devices seen
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Mean RSSI and sample count per device
    pub fn finish(self) -> Vec<DeviceSighting> {
        self.devices
            .into_iter()
            .map(|samples| DeviceSighting {
                mac_address: samples.mac_address,
                rssi: samples.sum / f64::from(samples.count),
                sample_count: samples.count,
                name: samples.name,
            })
            .collect()
    }
}
