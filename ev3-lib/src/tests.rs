use crate::command::{BufferSizes, Command, FrameHeader};
use crate::error::Ev3Error;
use crate::opcode::CommandType;
use crate::params::{Index, Power, Speed, TurnRatio, Volume};
use crate::types::{BrickButton, InputPort, OutputPort, Polarity};

fn encode_hex(command: &Command, sequence: u16) -> String {
    hex::encode(command.encode(sequence).expect("Failed to encode command"))
}

#[test]
fn test_stop_all_frame() {
    let mut command = Command::new(CommandType::DirectNoReply);
    command.stop_all();
    assert_eq!(encode_hex(&command, 1), "0c000100800000a38100810f8100");
}

#[test]
fn test_negative_power_frame() {
    let mut command = Command::new(CommandType::DirectNoReply);
    command.turn_motor_at_power(OutputPort::A, Power::new(-50).unwrap());
    assert_eq!(encode_hex(&command, 0x1234), "0c003412800000a48100810181ce");
}

#[test]
fn test_ready_si_frame() {
    let mut command = Command::with_buffers(CommandType::DirectReply, 4, 0).unwrap();
    command.ready_si(InputPort::Three, 2, Index::ZERO);
    assert_eq!(
        encode_hex(&command, 2),
        concat!("1300", "0200", "00", "0400", "991d", "8100", "8102", "8100", "8102", "8101", "e100")
    );
}

#[test]
fn test_system_command_has_no_buffer_header() {
    let mut command = Command::new(CommandType::SystemReply);
    command.delete_file("../prjs/x");
    assert_eq!(encode_hex(&command, 5), "0e000500019c2e2e2f70726a732f7800");

    let frame = command.encode(5).unwrap();
    let header = FrameHeader::parse(&frame).unwrap();
    assert_eq!(header.buffer_sizes, None);
    assert_eq!(header.body_offset(), 5);
}

#[test]
fn test_buffer_sizes_packing() {
    let sizes = BufferSizes::new().with_global(300).with_local(5);
    assert_eq!(sizes.into_bytes(), [0x2c, 0x15]);

    let sizes = BufferSizes::new().with_global(0x3ff).with_local(0x3f);
    assert_eq!(sizes.into_bytes(), [0xff, 0xff]);
}

#[test]
fn test_header_round_trip() {
    for (global, local, sequence) in [(0u16, 0u8, 1u16), (94, 0, 0xffff), (300, 5, 0x0100), (1023, 63, 42)] {
        let mut command = Command::with_buffers(CommandType::DirectReply, global, local).unwrap();
        command.is_brick_button_pressed(BrickButton::Enter, Index::ZERO);
        let frame = command.encode(sequence).unwrap();

        let header = FrameHeader::parse(&frame).unwrap();
        assert_eq!(header.length as usize, frame.len() - 2);
        assert_eq!(header.sequence, sequence);
        assert_eq!(header.command_type, CommandType::DirectReply);
        assert_eq!(header.buffer_sizes, Some((global, local)));
    }
}

#[test]
fn test_parameter_tags() {
    let mut command = Command::new(CommandType::DirectNoReply);
    command.step_motor_sync(
        OutputPort::B | OutputPort::C,
        Speed::new(100).unwrap(),
        TurnRatio::new(-200).unwrap(),
        720,
        true,
    );
    let frame = command.encode(1).unwrap();
    let body = &frame[7..];
    assert_eq!(
        hex::encode(body),
        // opcode, layer, ports, speed, turn ratio (short), steps (int), brake
        concat!("b0", "8100", "8106", "8164", "8238ff", "83d0020000", "8101")
    );
}

#[test]
fn test_string_parameter_is_nul_terminated() {
    let mut command = Command::new(CommandType::DirectNoReply);
    command.play_sound(Volume::new(100).unwrap(), "ui/Bo");
    let frame = command.encode(1).unwrap();
    assert_eq!(hex::encode(&frame[7..]), concat!("9402", "8164", "84", "75692f426f", "00"));
}

#[test]
fn test_polarity_is_signed_byte() {
    let mut command = Command::new(CommandType::DirectNoReply);
    command.set_motor_polarity(OutputPort::D, Polarity::Backward);
    let frame = command.encode(1).unwrap();
    assert_eq!(hex::encode(&frame[7..]), "a78100810881ff");
}

#[test]
fn test_global_index_forms() {
    let mut command = Command::new(CommandType::DirectReply);
    command.add_global_index(Index::new(255).unwrap());
    command.add_global_index(Index::new(300).unwrap());
    let frame = command.encode(1).unwrap();
    assert_eq!(hex::encode(&frame[7..]), "e1ffe22c01");
}

#[test]
fn test_two_byte_opcode_high_byte_first() {
    let mut command = Command::new(CommandType::DirectNoReply);
    command.update_ui();
    let frame = command.encode(1).unwrap();
    assert_eq!(&frame[7..], &[0x84, 0x00]);
}

#[test]
fn test_buffer_size_limits() {
    assert!(Command::with_buffers(CommandType::DirectReply, 1024, 64).is_ok());
    match Command::with_buffers(CommandType::DirectReply, 1025, 0) {
        Err(Ev3Error::OutOfRange { field, max, .. }) => {
            assert_eq!(field, "global buffer size");
            assert_eq!(max, 1024);
        }
        other => panic!("expected OutOfRange, got {other:?}"),
    }
    assert!(Command::with_buffers(CommandType::DirectReply, 0, 65).is_err());
}

#[test]
fn test_oversized_command_is_rejected() {
    let mut command = Command::new(CommandType::SystemNoReply);
    command.add_raw_bytes(&vec![0u8; 70_000]);
    assert!(matches!(command.encode(1), Err(Ev3Error::Protocol(_))));
}

#[test]
fn test_empty_command() {
    let mut command = Command::new(CommandType::DirectNoReply);
    assert!(command.is_empty());
    command.clean_ui();
    assert!(!command.is_empty());
}
