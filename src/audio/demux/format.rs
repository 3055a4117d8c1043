//! Container sniffing for sources that come without an extension or MIME type.

use crate::common::types::AudioFormat;

/// `(offset, magic, format)`; first match wins.
const SIGNATURES: &[(usize, &[u8], AudioFormat)] = &[
    (0, &[0x1A, 0x45, 0xDF, 0xA3], AudioFormat::Webm),
    (4, b"ftyp", AudioFormat::Mp4),
    (0, b"OggS", AudioFormat::Ogg),
    (0, b"fLaC", AudioFormat::Flac),
    (8, b"WAVE", AudioFormat::Wav),
    (0, b"ID3", AudioFormat::Mp3),
];

fn has_at(header: &[u8], offset: usize, magic: &[u8]) -> bool {
    header
        .get(offset..offset + magic.len())
        .is_some_and(|window| window == magic)
}

/// Guess the container from its first bytes. Fewer than 4 bytes is always
/// `Unknown`.
pub fn detect_format(header: &[u8]) -> AudioFormat {
    if header.len() < 4 {
        return AudioFormat::Unknown;
    }

    for &(offset, magic, format) in SIGNATURES {
        // WAVE alone at offset 8 is not enough, it must sit in a RIFF chunk
        if format == AudioFormat::Wav && !header.starts_with(b"RIFF") {
            continue;
        }
        if has_at(header, offset, magic) {
            return format;
        }
    }

    // Bare frame sync: ADTS has layer bits 00, MPEG audio anything else.
    if header[0] == 0xFF && header[1] & 0xE0 == 0xE0 {
        return if header[1] & 0xF6 == 0xF0 {
            AudioFormat::Aac
        } else {
            AudioFormat::Mp3
        };
    }

    AudioFormat::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_magics() {
        assert_eq!(
            detect_format(&[0x1A, 0x45, 0xDF, 0xA3, 0x01, 0x00]),
            AudioFormat::Webm
        );
        assert_eq!(detect_format(b"\x00\x00\x00\x1Cftypisom"), AudioFormat::Mp4);
        assert_eq!(detect_format(b"OggS\x00\x02"), AudioFormat::Ogg);
        assert_eq!(detect_format(b"fLaC\x00\x00\x00\x22"), AudioFormat::Flac);
        assert_eq!(detect_format(b"RIFF\x24\x00\x00\x00WAVEfmt "), AudioFormat::Wav);
    }

    #[test]
    fn wave_needs_riff() {
        assert_eq!(detect_format(b"XXXX\x24\x00\x00\x00WAVE"), AudioFormat::Unknown);
    }

    #[test]
    fn frame_sync_splits_mp3_from_adts() {
        assert_eq!(detect_format(b"ID3\x04\x00"), AudioFormat::Mp3);
        assert_eq!(detect_format(&[0xFF, 0xFB, 0x90, 0x64]), AudioFormat::Mp3);
        assert_eq!(detect_format(&[0xFF, 0xF1, 0x50, 0x80]), AudioFormat::Aac);
    }

    #[test]
    fn short_or_unrecognised_is_unknown() {
        assert_eq!(detect_format(b"Og"), AudioFormat::Unknown);
        assert_eq!(detect_format(&[0; 12]), AudioFormat::Unknown);
    }
}
