use peersync::audio::adts::{AdtsHeader, ADTS_HEADER_LEN, MAX_FRAME_LEN};
use peersync::audio::{AccessUnit, EncoderConfig, PcmFormat};

#[test]
fn test_header_round_trip_for_reference_format() {
    let header = AdtsHeader::for_config(&EncoderConfig::default()).unwrap();

    for len in [0usize, 1, 100, 371, 1024, 2048, MAX_FRAME_LEN - ADTS_HEADER_LEN] {
        let bytes = header.encode(len).unwrap();
        assert_eq!(bytes[0], 0xFF);
        assert_eq!(bytes[1], 0xF9);
        assert_eq!(bytes[6], 0xFC);

        let parsed = AdtsHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.frame_len, len + 7, "payload {}", len);
        assert_eq!(parsed.header.profile, 2);
        assert_eq!(parsed.header.freq_idx, 4);
        assert_eq!(parsed.header.chan_cfg, 2);
    }
}

#[test]
fn test_frame_prefixes_access_unit() {
    let header = AdtsHeader::new(2, 4, 2).unwrap();
    let unit = AccessUnit {
        data: vec![0xAB; 300],
        presentation_timestamp_us: 23_220,
    };

    let frame = header.frame(unit).unwrap();
    assert_eq!(frame.payload.len(), 307);
    assert_eq!(frame.presentation_timestamp_us, 23_220);
    assert!(frame.payload[7..].iter().all(|&b| b == 0xAB));
    assert_eq!(AdtsHeader::parse(&frame.payload).unwrap().frame_len, 307);
}

#[test]
fn test_other_formats_map_to_their_index() {
    let mono_48k = EncoderConfig::aac_lc(&PcmFormat {
        sample_rate: 48_000,
        channels: 1,
        bits_per_sample: 16,
    });
    let header = AdtsHeader::for_config(&mono_48k).unwrap();
    assert_eq!(header.freq_idx, 3);
    assert_eq!(header.chan_cfg, 1);

    let parsed = AdtsHeader::parse(&header.encode(64).unwrap()).unwrap();
    assert_eq!(parsed.header, header);
}

#[test]
fn test_high_channel_config_bit_spans_bytes() {
    let header = AdtsHeader::new(2, 4, 7).unwrap();
    let bytes = header.encode(10).unwrap();
    assert_eq!(bytes[2] & 0x01, 1);
    assert_eq!(bytes[3] >> 6, 3);
    assert_eq!(AdtsHeader::parse(&bytes).unwrap().header.chan_cfg, 7);
}

#[test]
fn test_invalid_parameters_rejected() {
    assert!(AdtsHeader::new(0, 4, 2).is_err());
    assert!(AdtsHeader::new(5, 4, 2).is_err());
    assert!(AdtsHeader::new(2, 13, 2).is_err());
    assert!(AdtsHeader::new(2, 4, 8).is_err());

    let odd_rate = EncoderConfig::aac_lc(&PcmFormat {
        sample_rate: 44_000,
        channels: 2,
        bits_per_sample: 16,
    });
    assert!(AdtsHeader::for_config(&odd_rate).is_err());
}
