use spacelink::coding::{
    AsmDecoder, AsmEncoder, ChannelDecoder, ChannelEncoder, CltuDecoder, CltuEncoder,
    RandomizerDecoder, RandomizerEncoder, ReedSolomonDecoder, ReedSolomonEncoder,
};
use spacelink::frame::{
    AosConfig, AosFrame, AosFrameBuilder, TcConfig, TcFrame, TcFrameBuilder, TmConfig, TmFrame,
    TmFrameBuilder, TransferFrame, UserDataType,
};
use spacelink::ocf::{ClcwBuilder, Ocf};

#[test]
fn tc_frame_through_randomized_cltu() {
    let payload = b"TestDataPayloadForADFrame";
    let mut builder = TcFrameBuilder::new(true);
    builder.set_scid(0xab).unwrap();
    builder.set_vcid(5).unwrap();
    builder.set_vcfc(0xcd);
    assert_eq!(builder.add_data(payload), 0);
    let frame = builder.build().unwrap();
    assert_eq!(
        hex::encode(frame.frame()),
        format!("00ab141fcd{}7858", hex::encode(payload))
    );

    let encoder = ChannelEncoder::new()
        .add_stage(CltuEncoder::new().with_randomization(true))
        .seal();
    let cltu = encoder.apply(frame.frame()).unwrap();
    assert_eq!(&cltu[..2], &[0xeb, 0x90]);

    let config = TcConfig::builder().fecf(true).build();
    let decoder = ChannelDecoder::new(move |dat: &[u8]| {
        TcFrame::decode(dat.to_vec(), &config, |_| false)
    })
    .add_stage(CltuDecoder::new().with_randomization(true))
    .seal();
    let decoded = decoder.apply(&cltu).unwrap();

    assert_eq!(decoded, frame);
    assert_eq!(decoded.data_field(), payload);
    assert!(decoded.is_valid());
}

#[test]
fn tm_frame_through_telemetry_coding_chain() {
    // one RS data block worth of frame
    let packet: Vec<u8> = (0..215).map(|i| ((i * 5 + 1) % 256) as u8).collect();
    let mut builder = TmFrameBuilder::new(223, 0, false, true).unwrap();
    builder.set_scid(0x2a).unwrap();
    builder.set_vcid(3).unwrap();
    builder.set_mcfc(7);
    builder.set_vcfc(7);
    assert_eq!(builder.add_space_packet(&packet), 0);
    let frame = builder.build().unwrap();

    let encoder = ChannelEncoder::new()
        .add_stage(ReedSolomonEncoder::new())
        .add_stage(RandomizerEncoder)
        .add_stage(AsmEncoder::new())
        .seal();
    let mut channel = encoder.apply(frame.frame()).unwrap();
    assert_eq!(channel.len(), 4 + 255, "marker plus one RS block");

    // noise on the link, inside the RS-protected region
    channel[10] ^= 0xff;
    channel[150] ^= 0x42;

    let config = TmConfig::builder().fecf(true).build();
    let decoder = ChannelDecoder::new(move |dat: &[u8]| TmFrame::decode(dat.to_vec(), &config))
        .add_stage(AsmDecoder::new())
        .add_stage(RandomizerDecoder)
        .add_stage(ReedSolomonDecoder::new())
        .seal();
    let decoded = decoder.apply(&channel).unwrap();

    assert_eq!(decoded.scid, 0x2a);
    assert_eq!(decoded.vcid, 3);
    assert_eq!(decoded.first_header_pointer, 0);
    assert_eq!(decoded.data_field(), packet);
    assert!(decoded.is_valid(), "frame error control must verify");
}

#[test]
fn aos_idle_frame_through_asm() {
    let mut builder = AosFrameBuilder::new(64, false, 0, UserDataType::Idle, false, false).unwrap();
    builder.set_scid(0x55).unwrap();
    builder.set_vcfc(3).unwrap();
    builder.set_idle();
    let frame = builder.build().unwrap();

    let encoder = ChannelEncoder::new()
        .add_stage(RandomizerEncoder)
        .add_stage(AsmEncoder::new())
        .seal();
    let channel = encoder.apply(frame.frame()).unwrap();

    let config = AosConfig::builder().user_data_type(UserDataType::Idle).build();
    let decoder = ChannelDecoder::new(move |dat: &[u8]| AosFrame::decode(dat.to_vec(), &config))
        .add_stage(AsmDecoder::new())
        .add_stage(RandomizerDecoder)
        .seal();
    let decoded = decoder.apply(&channel).unwrap();

    assert!(decoded.is_idle());
    assert_eq!(decoded.vcid, AosFrame::VCID_IDLE);
    assert_eq!(decoded.frame().len(), 64);
}

#[test]
fn clcw_reported_in_tm_ocf() {
    let mut clcw = ClcwBuilder::new();
    clcw.set_vcid(2).unwrap();
    clcw.set_lockout(true);
    clcw.set_report_value(0x1f);
    let clcw = clcw.build();

    let mut builder = TmFrameBuilder::new(32, 0, true, true).unwrap();
    builder.set_scid(0x2a).unwrap();
    builder.set_ocf(clcw.encode()).unwrap();
    assert_eq!(builder.add_data(&[0x66; 20]), 0);
    let frame = builder.build().unwrap();

    let ocf = frame.ocf().expect("frame was built with an OCF");
    assert_eq!(Ocf::decode(ocf).unwrap(), Ocf::Clcw(clcw));
}

#[test]
fn batch_coding_preserves_order() {
    let config = TcConfig::builder().fecf(true).build();
    let frames: Vec<Vec<u8>> = (0..24u8)
        .map(|i| {
            let mut builder = TcFrameBuilder::new(true);
            builder.set_scid(0xab).unwrap();
            builder.set_vcfc(i);
            builder.add_data(format!("frame {i:02}").as_bytes());
            builder.build().unwrap().frame().to_vec()
        })
        .collect();

    let encoder = ChannelEncoder::new()
        .add_stage(CltuEncoder::new().with_randomization(true))
        .seal();
    let cltus = encoder.apply_batch(&frames).unwrap();
    for (frame, cltu) in frames.iter().zip(&cltus) {
        assert_eq!(cltu, &encoder.apply(frame).unwrap());
    }

    let decoder = ChannelDecoder::new(move |dat: &[u8]| {
        TcFrame::decode(dat.to_vec(), &config, |_| false)
    })
    .add_stage(CltuDecoder::new().with_randomization(true))
    .seal();
    let decoded = decoder.apply_batch(&cltus).unwrap();
    for (i, frame) in decoded.iter().enumerate() {
        assert_eq!(usize::from(frame.vcfc), i, "batch order must be preserved");
        assert_eq!(frame.data_field(), format!("frame {i:02}").as_bytes());
    }
}
