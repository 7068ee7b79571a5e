//! Direct commands issued one at a time.
//!
//! Actuation methods send without a reply and return once the frame has been
//! handed to the transport. Query methods reserve a global buffer sized for
//! their result and decode it. Every numeric argument is range-checked
//! before anything is written.

use crate::brick::Brick;
use crate::command::Command;
use crate::constants::{FIRMWARE_VERSION_SIZE, NAME_BUFFER_SIZE};
use crate::error::{Ev3Error, Result};
use crate::opcode::CommandType;
use crate::params::{Index, Power, Speed, TurnRatio, Volume};
use crate::types::{BrickButton, Color, DeviceType, FontType, InputPort, LedPattern, OutputPort, Polarity};
use bytes::Bytes;

/// Decodes a NUL-terminated UTF-8 string from a reply buffer.
pub fn decode_string(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

fn require(data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(Ev3Error::InsufficientData {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

pub struct DirectCommands<'a> {
    brick: &'a Brick,
}

impl<'a> DirectCommands<'a> {
    pub(crate) fn new(brick: &'a Brick) -> Self {
        Self { brick }
    }

    async fn send(&self, build: impl FnOnce(&mut Command)) -> Result<()> {
        let mut command = Command::new(CommandType::DirectNoReply);
        build(&mut command);
        self.brick.execute(&command).await?;
        Ok(())
    }

    async fn query(&self, global_size: u16, build: impl FnOnce(&mut Command)) -> Result<Bytes> {
        let mut command = Command::with_buffers(CommandType::DirectReply, global_size, 0)?;
        build(&mut command);
        let reply = self.brick.execute(&command).await?.into_reply()?;
        if reply.is_error() {
            return Err(Ev3Error::DirectReplyFailed {
                sequence: reply.sequence,
            });
        }
        Ok(reply.data)
    }

    // Motors

    pub async fn start_motor(&self, ports: OutputPort) -> Result<()> {
        self.send(|c| {
            c.start_motor(ports);
        })
        .await
    }

    pub async fn stop_motor(&self, ports: OutputPort, brake: bool) -> Result<()> {
        self.send(|c| {
            c.stop_motor(ports, brake);
        })
        .await
    }

    pub async fn stop_all(&self) -> Result<()> {
        self.send(|c| {
            c.stop_all();
        })
        .await
    }

    pub async fn turn_motor_at_power(&self, ports: OutputPort, power: i32) -> Result<()> {
        let power = Power::try_from(power)?;
        self.send(|c| {
            c.turn_motor_at_power(ports, power);
        })
        .await
    }

    pub async fn turn_motor_at_speed(&self, ports: OutputPort, speed: i32) -> Result<()> {
        let speed = Speed::try_from(speed)?;
        self.send(|c| {
            c.turn_motor_at_speed(ports, speed);
        })
        .await
    }

    pub async fn step_motor_at_power(&self, ports: OutputPort, power: i32, steps: u32, brake: bool) -> Result<()> {
        self.step_motor_at_power_ramped(ports, power, 0, steps, 0, brake)
            .await
    }

    pub async fn step_motor_at_power_ramped(
        &self,
        ports: OutputPort,
        power: i32,
        ramp_up_steps: u32,
        constant_steps: u32,
        ramp_down_steps: u32,
        brake: bool,
    ) -> Result<()> {
        let power = Power::try_from(power)?;
        self.send(|c| {
            c.step_motor_at_power(ports, power, ramp_up_steps, constant_steps, ramp_down_steps, brake);
        })
        .await
    }

    pub async fn step_motor_at_speed(&self, ports: OutputPort, speed: i32, steps: u32, brake: bool) -> Result<()> {
        self.step_motor_at_speed_ramped(ports, speed, 0, steps, 0, brake)
            .await
    }

    pub async fn step_motor_at_speed_ramped(
        &self,
        ports: OutputPort,
        speed: i32,
        ramp_up_steps: u32,
        constant_steps: u32,
        ramp_down_steps: u32,
        brake: bool,
    ) -> Result<()> {
        let speed = Speed::try_from(speed)?;
        self.send(|c| {
            c.step_motor_at_speed(ports, speed, ramp_up_steps, constant_steps, ramp_down_steps, brake);
        })
        .await
    }

    pub async fn turn_motor_at_power_for_time(
        &self,
        ports: OutputPort,
        power: i32,
        milliseconds: u32,
        brake: bool,
    ) -> Result<()> {
        self.turn_motor_at_power_for_time_ramped(ports, power, 0, milliseconds, 0, brake)
            .await
    }

    pub async fn turn_motor_at_power_for_time_ramped(
        &self,
        ports: OutputPort,
        power: i32,
        ramp_up_ms: u32,
        constant_ms: u32,
        ramp_down_ms: u32,
        brake: bool,
    ) -> Result<()> {
        let power = Power::try_from(power)?;
        self.send(|c| {
            c.turn_motor_at_power_for_time(ports, power, ramp_up_ms, constant_ms, ramp_down_ms, brake);
        })
        .await
    }

    pub async fn turn_motor_at_speed_for_time(
        &self,
        ports: OutputPort,
        speed: i32,
        milliseconds: u32,
        brake: bool,
    ) -> Result<()> {
        self.turn_motor_at_speed_for_time_ramped(ports, speed, 0, milliseconds, 0, brake)
            .await
    }

    pub async fn turn_motor_at_speed_for_time_ramped(
        &self,
        ports: OutputPort,
        speed: i32,
        ramp_up_ms: u32,
        constant_ms: u32,
        ramp_down_ms: u32,
        brake: bool,
    ) -> Result<()> {
        let speed = Speed::try_from(speed)?;
        self.send(|c| {
            c.turn_motor_at_speed_for_time(ports, speed, ramp_up_ms, constant_ms, ramp_down_ms, brake);
        })
        .await
    }

    pub async fn set_motor_polarity(&self, ports: OutputPort, polarity: Polarity) -> Result<()> {
        self.send(|c| {
            c.set_motor_polarity(ports, polarity);
        })
        .await
    }

    pub async fn step_motor_sync(
        &self,
        ports: OutputPort,
        speed: i32,
        turn_ratio: i32,
        steps: u32,
        brake: bool,
    ) -> Result<()> {
        let speed = Speed::try_from(speed)?;
        let turn_ratio = TurnRatio::try_from(turn_ratio)?;
        self.send(|c| {
            c.step_motor_sync(ports, speed, turn_ratio, steps, brake);
        })
        .await
    }

    pub async fn time_motor_sync(
        &self,
        ports: OutputPort,
        speed: i32,
        turn_ratio: i32,
        milliseconds: u32,
        brake: bool,
    ) -> Result<()> {
        let speed = Speed::try_from(speed)?;
        let turn_ratio = TurnRatio::try_from(turn_ratio)?;
        self.send(|c| {
            c.time_motor_sync(ports, speed, turn_ratio, milliseconds, brake);
        })
        .await
    }

    pub async fn output_ready(&self, ports: OutputPort) -> Result<()> {
        self.send(|c| {
            c.output_ready(ports);
        })
        .await
    }

    // Inputs

    pub async fn clear_all_devices(&self) -> Result<()> {
        self.send(|c| {
            c.clear_all_devices();
        })
        .await
    }

    pub async fn clear_changes(&self, port: InputPort) -> Result<()> {
        self.send(|c| {
            c.clear_changes(port);
        })
        .await
    }

    /// Device type and active mode of `port`.
    pub async fn get_type_mode(&self, port: InputPort) -> Result<(DeviceType, u8)> {
        let mode_index = Index::ZERO.offset(1)?;
        let data = self
            .query(2, |c| {
                c.get_type_mode(port, Index::ZERO, mode_index);
            })
            .await?;
        require(&data, 2)?;
        Ok((DeviceType::from(data[0]), data[1]))
    }

    pub async fn read_si(&self, port: InputPort, mode: u8) -> Result<f32> {
        let data = self
            .query(4, |c| {
                c.ready_si(port, mode, Index::ZERO);
            })
            .await?;
        require(&data, 4)?;
        Ok(f32::from_le_bytes(data[..4].try_into()?))
    }

    pub async fn read_raw(&self, port: InputPort, mode: u8) -> Result<i32> {
        let data = self
            .query(4, |c| {
                c.ready_raw(port, mode, Index::ZERO);
            })
            .await?;
        require(&data, 4)?;
        Ok(i32::from_le_bytes(data[..4].try_into()?))
    }

    pub async fn read_percent(&self, port: InputPort, mode: u8) -> Result<u8> {
        let data = self
            .query(1, |c| {
                c.ready_percent(port, mode, Index::ZERO);
            })
            .await?;
        require(&data, 1)?;
        Ok(data[0])
    }

    pub async fn get_device_name(&self, port: InputPort) -> Result<String> {
        let data = self
            .query(NAME_BUFFER_SIZE, |c| {
                c.get_device_name(port, NAME_BUFFER_SIZE as u8, Index::ZERO);
            })
            .await?;
        Ok(decode_string(&data))
    }

    pub async fn get_mode_name(&self, port: InputPort, mode: u8) -> Result<String> {
        let data = self
            .query(NAME_BUFFER_SIZE, |c| {
                c.get_mode_name(port, mode, NAME_BUFFER_SIZE as u8, Index::ZERO);
            })
            .await?;
        Ok(decode_string(&data))
    }

    // Sound

    pub async fn play_tone(&self, volume: i32, frequency: u16, duration_ms: u16) -> Result<()> {
        let volume = Volume::try_from(volume)?;
        self.send(|c| {
            c.play_tone(volume, frequency, duration_ms);
        })
        .await
    }

    /// Plays a sound file stored on the brick, path without the `.rsf`
    /// extension.
    pub async fn play_sound(&self, volume: i32, path: &str) -> Result<()> {
        let volume = Volume::try_from(volume)?;
        self.send(|c| {
            c.play_sound(volume, path);
        })
        .await
    }

    // UI

    pub async fn get_firmware_version(&self) -> Result<String> {
        let data = self
            .query(FIRMWARE_VERSION_SIZE, |c| {
                c.get_firmware_version(FIRMWARE_VERSION_SIZE as u8, Index::ZERO);
            })
            .await?;
        Ok(decode_string(&data))
    }

    pub async fn is_brick_button_pressed(&self, button: BrickButton) -> Result<bool> {
        let data = self
            .query(1, |c| {
                c.is_brick_button_pressed(button, Index::ZERO);
            })
            .await?;
        require(&data, 1)?;
        Ok(data[0] == 1)
    }

    pub async fn set_led_pattern(&self, pattern: LedPattern) -> Result<()> {
        self.send(|c| {
            c.set_led_pattern(pattern);
        })
        .await
    }

    pub async fn clean_ui(&self) -> Result<()> {
        self.send(|c| {
            c.clean_ui();
        })
        .await
    }

    pub async fn update_ui(&self) -> Result<()> {
        self.send(|c| {
            c.update_ui();
        })
        .await
    }

    pub async fn draw_line(&self, color: Color, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<()> {
        self.send(|c| {
            c.draw_line(color, x0, y0, x1, y1);
        })
        .await
    }

    pub async fn draw_pixel(&self, color: Color, x: u16, y: u16) -> Result<()> {
        self.send(|c| {
            c.draw_pixel(color, x, y);
        })
        .await
    }

    /// Draws `text`. Nothing shows until [`update_ui`](Self::update_ui).
    pub async fn draw_text(&self, color: Color, x: u16, y: u16, text: &str) -> Result<()> {
        self.send(|c| {
            c.draw_text(color, x, y, text);
        })
        .await
    }

    /// Draws an `.rgf` image stored on the brick.
    pub async fn draw_image(&self, color: Color, x: u16, y: u16, path: &str) -> Result<()> {
        self.send(|c| {
            c.draw_image(color, x, y, path);
        })
        .await
    }

    pub async fn select_font(&self, font: FontType) -> Result<()> {
        self.send(|c| {
            c.select_font(font);
        })
        .await
    }

    pub async fn enable_top_line(&self, enabled: bool) -> Result<()> {
        self.send(|c| {
            c.enable_top_line(enabled);
        })
        .await
    }
}
