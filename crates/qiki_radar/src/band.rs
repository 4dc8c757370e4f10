//! Range-band classification and identity stripping.
//!
//! A detection is `LR` iff its range exceeds the SR threshold. Long-range
//! detections never carry identity; the validator here is the single place
//! that enforces it before anything reaches the bus.

use qiki_contracts::radar::{RadarDetection, RadarFrame, RangeBand};

/// Classify a range against the SR threshold.
#[must_use]
pub fn classify(range_m: f64, sr_threshold_m: f64) -> RangeBand {
    if range_m > sr_threshold_m {
        RangeBand::Lr
    } else {
        RangeBand::Sr
    }
}

/// Re-band a detection and strip identity if it lands in LR.
pub fn sanitize_detection(detection: &mut RadarDetection, sr_threshold_m: f64) {
    detection.band = classify(detection.range_m, sr_threshold_m);
    if detection.band == RangeBand::Lr {
        detection.transponder_id = None;
    }
}

/// Sanitize every detection in a frame.
pub fn sanitize_frame(frame: &mut RadarFrame, sr_threshold_m: f64) {
    for detection in &mut frame.detections {
        sanitize_detection(detection, sr_threshold_m);
    }
}

/// Split a frame into its LR-only subset, preserving order.
#[must_use]
pub fn lr_subset(frame: &RadarFrame) -> RadarFrame {
    RadarFrame {
        ts: frame.ts,
        mono_ns: frame.mono_ns,
        ego: frame.ego,
        detections: frame
            .detections
            .iter()
            .filter(|d| d.band == RangeBand::Lr)
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use qiki_contracts::radar::EgoPose;

    use super::*;

    fn detection(range_m: f64, id: Option<&str>) -> RadarDetection {
        RadarDetection {
            bearing_rad: 0.0,
            elevation_rad: 0.0,
            range_m,
            snr_db: 10.0,
            band: RangeBand::Sr,
            scene_id: 1,
            transponder_id: id.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_boundary() {
        assert_eq!(classify(100.1, 100.0), RangeBand::Lr);
        assert_eq!(classify(100.0, 100.0), RangeBand::Sr);
        assert_eq!(classify(60.0, 100.0), RangeBand::Sr);
    }

    #[test]
    fn test_lr_detection_loses_identity() {
        let mut d = detection(5000.0, Some("FRIEND-1"));
        sanitize_detection(&mut d, 100.0);
        assert_eq!(d.band, RangeBand::Lr);
        assert!(d.transponder_id.is_none());
    }

    #[test]
    fn test_sr_detection_keeps_identity() {
        let mut d = detection(60.0, Some("FRIEND-1"));
        sanitize_detection(&mut d, 100.0);
        assert_eq!(d.band, RangeBand::Sr);
        assert_eq!(d.transponder_id.as_deref(), Some("FRIEND-1"));
    }

    #[test]
    fn test_lr_subset_filters() {
        let mut frame = RadarFrame {
            ts: Utc::now(),
            mono_ns: 0,
            ego: EgoPose::default(),
            detections: vec![detection(5000.0, None), detection(60.0, None)],
        };
        sanitize_frame(&mut frame, 100.0);
        let lr = lr_subset(&frame);
        assert_eq!(lr.detections.len(), 1);
        assert_eq!(lr.detections[0].band, RangeBand::Lr);
    }
}
