//! Audio buffering between capture/playback threads and the network path.
//!
//! All audio is PCM 16-bit signed little-endian, mono by default, at the
//! session's fixed sample rate. Mixing formats within one bridge is a caller
//! error.

mod bridge;
mod sender;

pub use bridge::AudioBridge;
pub use sender::AudioSender;

/// Encode samples as little-endian bytes for the wire.
pub fn pcm_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Decode little-endian bytes into samples. Returns `None` for an odd-length
/// payload.
pub fn bytes_to_pcm(bytes: &[u8]) -> Option<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_byte_conversion() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN];
        let bytes = pcm_to_bytes(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);
        assert_eq!(bytes_to_pcm(&bytes).unwrap(), samples);
    }

    #[test]
    fn test_odd_length_rejected() {
        assert!(bytes_to_pcm(&[0u8, 1, 2]).is_none());
    }
}
