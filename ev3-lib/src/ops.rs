//! Opcode builders appended onto a [`Command`].
//!
//! Each builder emits one opcode followed by its parameters in the order the
//! brick's VM expects them. Numeric inputs are taken as range-checked
//! newtypes, so a builder call can never produce an out-of-range value.

use crate::command::Command;
use crate::opcode::{Opcode, SystemOpcode};
use crate::params::{Index, Power, Speed, TurnRatio, Volume};
use crate::types::{BrickButton, Color, FontType, InputPort, LedPattern, OutputPort, Polarity};

/// Daisy-chain layer. Only the first brick in a chain is addressed.
const LAYER: u8 = 0x00;

fn brake_flag(brake: bool) -> u8 {
    if brake { 0x01 } else { 0x00 }
}

impl Command {
    // Motors

    pub fn start_motor(&mut self, ports: OutputPort) -> &mut Self {
        self.add_opcode(Opcode::OutputStart).add_u8(LAYER).add_u8(ports.bits())
    }

    pub fn turn_motor_at_power(&mut self, ports: OutputPort, power: Power) -> &mut Self {
        self.add_opcode(Opcode::OutputPower)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_i8(power.get())
    }

    pub fn turn_motor_at_speed(&mut self, ports: OutputPort, speed: Speed) -> &mut Self {
        self.add_opcode(Opcode::OutputSpeed)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_i8(speed.get())
    }

    /// Turns the motors for a number of tacho steps split into ramp up,
    /// constant and ramp down phases.
    pub fn step_motor_at_power(
        &mut self,
        ports: OutputPort,
        power: Power,
        ramp_up_steps: u32,
        constant_steps: u32,
        ramp_down_steps: u32,
        brake: bool,
    ) -> &mut Self {
        self.add_opcode(Opcode::OutputStepPower)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_i8(power.get())
            .add_u32(ramp_up_steps)
            .add_u32(constant_steps)
            .add_u32(ramp_down_steps)
            .add_u8(brake_flag(brake))
    }

    pub fn step_motor_at_speed(
        &mut self,
        ports: OutputPort,
        speed: Speed,
        ramp_up_steps: u32,
        constant_steps: u32,
        ramp_down_steps: u32,
        brake: bool,
    ) -> &mut Self {
        self.add_opcode(Opcode::OutputStepSpeed)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_i8(speed.get())
            .add_u32(ramp_up_steps)
            .add_u32(constant_steps)
            .add_u32(ramp_down_steps)
            .add_u8(brake_flag(brake))
    }

    pub fn turn_motor_at_power_for_time(
        &mut self,
        ports: OutputPort,
        power: Power,
        ramp_up_ms: u32,
        constant_ms: u32,
        ramp_down_ms: u32,
        brake: bool,
    ) -> &mut Self {
        self.add_opcode(Opcode::OutputTimePower)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_i8(power.get())
            .add_u32(ramp_up_ms)
            .add_u32(constant_ms)
            .add_u32(ramp_down_ms)
            .add_u8(brake_flag(brake))
    }

    pub fn turn_motor_at_speed_for_time(
        &mut self,
        ports: OutputPort,
        speed: Speed,
        ramp_up_ms: u32,
        constant_ms: u32,
        ramp_down_ms: u32,
        brake: bool,
    ) -> &mut Self {
        self.add_opcode(Opcode::OutputTimeSpeed)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_i8(speed.get())
            .add_u32(ramp_up_ms)
            .add_u32(constant_ms)
            .add_u32(ramp_down_ms)
            .add_u8(brake_flag(brake))
    }

    pub fn set_motor_polarity(&mut self, ports: OutputPort, polarity: Polarity) -> &mut Self {
        self.add_opcode(Opcode::OutputPolarity)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_i8(polarity.into())
    }

    /// Drives two motors in lockstep for `steps` tacho counts.
    pub fn step_motor_sync(
        &mut self,
        ports: OutputPort,
        speed: Speed,
        turn_ratio: TurnRatio,
        steps: u32,
        brake: bool,
    ) -> &mut Self {
        self.add_opcode(Opcode::OutputStepSync)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_i8(speed.get())
            .add_i16(turn_ratio.get())
            .add_u32(steps)
            .add_u8(brake_flag(brake))
    }

    pub fn time_motor_sync(
        &mut self,
        ports: OutputPort,
        speed: Speed,
        turn_ratio: TurnRatio,
        milliseconds: u32,
        brake: bool,
    ) -> &mut Self {
        self.add_opcode(Opcode::OutputTimeSync)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_i8(speed.get())
            .add_i16(turn_ratio.get())
            .add_u32(milliseconds)
            .add_u8(brake_flag(brake))
    }

    pub fn stop_motor(&mut self, ports: OutputPort, brake: bool) -> &mut Self {
        self.add_opcode(Opcode::OutputStop)
            .add_u8(LAYER)
            .add_u8(ports.bits())
            .add_u8(brake_flag(brake))
    }

    /// Coasts every output to a stop.
    pub fn stop_all(&mut self) -> &mut Self {
        self.stop_motor(OutputPort::ALL, false)
    }

    /// Blocks the brick's command queue until the given outputs finish.
    pub fn output_ready(&mut self, ports: OutputPort) -> &mut Self {
        self.add_opcode(Opcode::OutputReady).add_u8(LAYER).add_u8(ports.bits())
    }

    // Input devices

    pub fn clear_all_devices(&mut self) -> &mut Self {
        self.add_opcode(Opcode::InputDeviceClearAll).add_u8(LAYER)
    }

    pub fn clear_changes(&mut self, port: InputPort) -> &mut Self {
        self.add_opcode(Opcode::InputDeviceClearChanges)
            .add_u8(LAYER)
            .add_u8(port.into())
    }

    /// Device type lands at `type_index`, active mode at `mode_index`.
    pub fn get_type_mode(&mut self, port: InputPort, type_index: Index, mode_index: Index) -> &mut Self {
        self.add_opcode(Opcode::InputDeviceGetTypeMode)
            .add_u8(LAYER)
            .add_u8(port.into())
            .add_global_index(type_index)
            .add_global_index(mode_index)
    }

    fn ready_value(&mut self, opcode: Opcode, port: InputPort, mode: u8, index: Index) -> &mut Self {
        self.add_opcode(opcode)
            .add_u8(LAYER)
            .add_u8(port.into())
            .add_u8(0x00) // keep current type
            .add_u8(mode)
            .add_u8(0x01) // one value
            .add_global_index(index)
    }

    /// Reading in SI units, a 4-byte float.
    pub fn ready_si(&mut self, port: InputPort, mode: u8, index: Index) -> &mut Self {
        self.ready_value(Opcode::InputDeviceReadySi, port, mode, index)
    }

    /// Reading in device units, a 4-byte integer.
    pub fn ready_raw(&mut self, port: InputPort, mode: u8, index: Index) -> &mut Self {
        self.ready_value(Opcode::InputDeviceReadyRaw, port, mode, index)
    }

    /// Reading as a percentage, one byte.
    pub fn ready_percent(&mut self, port: InputPort, mode: u8, index: Index) -> &mut Self {
        self.ready_value(Opcode::InputDeviceReadyPct, port, mode, index)
    }

    pub fn get_device_name(&mut self, port: InputPort, buffer_size: u8, index: Index) -> &mut Self {
        self.add_opcode(Opcode::InputDeviceGetDeviceName)
            .add_u8(LAYER)
            .add_u8(port.into())
            .add_u8(buffer_size)
            .add_global_index(index)
    }

    pub fn get_mode_name(&mut self, port: InputPort, mode: u8, buffer_size: u8, index: Index) -> &mut Self {
        self.add_opcode(Opcode::InputDeviceGetModeName)
            .add_u8(LAYER)
            .add_u8(port.into())
            .add_u8(mode)
            .add_u8(buffer_size)
            .add_global_index(index)
    }

    // Sound

    pub fn play_tone(&mut self, volume: Volume, frequency: u16, duration_ms: u16) -> &mut Self {
        self.add_opcode(Opcode::SoundTone)
            .add_u8(volume.get())
            .add_u16(frequency)
            .add_u16(duration_ms)
    }

    /// Plays an `.rsf` file stored on the brick. The path omits the extension.
    pub fn play_sound(&mut self, volume: Volume, path: &str) -> &mut Self {
        self.add_opcode(Opcode::SoundPlay).add_u8(volume.get()).add_str(path)
    }

    // UI

    pub fn get_firmware_version(&mut self, max_length: u8, index: Index) -> &mut Self {
        self.add_opcode(Opcode::UiReadGetFirmware)
            .add_u8(max_length)
            .add_global_index(index)
    }

    pub fn is_brick_button_pressed(&mut self, button: BrickButton, index: Index) -> &mut Self {
        self.add_opcode(Opcode::UiButtonPressed)
            .add_u8(button.into())
            .add_global_index(index)
    }

    pub fn set_led_pattern(&mut self, pattern: LedPattern) -> &mut Self {
        self.add_opcode(Opcode::UiWriteLed).add_u8(pattern.into())
    }

    pub fn clean_ui(&mut self) -> &mut Self {
        self.add_opcode(Opcode::UiDrawClean)
    }

    /// Flushes pending drawing operations to the screen.
    pub fn update_ui(&mut self) -> &mut Self {
        self.add_opcode(Opcode::UiDrawUpdate)
    }

    pub fn draw_pixel(&mut self, color: Color, x: u16, y: u16) -> &mut Self {
        self.add_opcode(Opcode::UiDrawPixel)
            .add_u8(color.into())
            .add_u16(x)
            .add_u16(y)
    }

    pub fn draw_line(&mut self, color: Color, x0: u16, y0: u16, x1: u16, y1: u16) -> &mut Self {
        self.add_opcode(Opcode::UiDrawLine)
            .add_u8(color.into())
            .add_u16(x0)
            .add_u16(y0)
            .add_u16(x1)
            .add_u16(y1)
    }

    pub fn draw_text(&mut self, color: Color, x: u16, y: u16, text: &str) -> &mut Self {
        self.add_opcode(Opcode::UiDrawText)
            .add_u8(color.into())
            .add_u16(x)
            .add_u16(y)
            .add_str(text)
    }

    /// Draws an `.rgf` image stored on the brick.
    pub fn draw_image(&mut self, color: Color, x: u16, y: u16, path: &str) -> &mut Self {
        self.add_opcode(Opcode::UiDrawBmpFile)
            .add_u8(color.into())
            .add_u16(x)
            .add_u16(y)
            .add_str(path)
    }

    pub fn select_font(&mut self, font: FontType) -> &mut Self {
        self.add_opcode(Opcode::UiDrawSelectFont).add_u8(font.into())
    }

    pub fn enable_top_line(&mut self, enabled: bool) -> &mut Self {
        self.add_opcode(Opcode::UiDrawTopline).add_u8(u8::from(enabled))
    }

    // System

    pub fn begin_download(&mut self, file_size: u32, path: &str) -> &mut Self {
        self.add_system_opcode(SystemOpcode::BeginDownload)
            .add_raw_u32(file_size)
            .add_raw_str(path)
    }

    pub fn continue_download(&mut self, handle: u8, chunk: &[u8]) -> &mut Self {
        self.add_system_opcode(SystemOpcode::ContinueDownload)
            .add_raw_u8(handle)
            .add_raw_bytes(chunk)
    }

    pub fn delete_file(&mut self, path: &str) -> &mut Self {
        self.add_system_opcode(SystemOpcode::DeleteFile).add_raw_str(path)
    }

    pub fn create_directory(&mut self, path: &str) -> &mut Self {
        self.add_system_opcode(SystemOpcode::CreateDirectory).add_raw_str(path)
    }
}
