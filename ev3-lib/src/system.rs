//! Filesystem commands.
//!
//! Device paths are relative to the brick's program root and must start
//! with one of its top-level folders such as `../prjs/`, `../apps/` or
//! `../tools/`. The brick enforces this, the client does not.

use crate::brick::Brick;
use crate::command::Command;
use crate::constants::FILE_CHUNK_SIZE;
use crate::error::{Ev3Error, Result};
use crate::opcode::{CommandType, SystemOpcode, SystemReplyStatus};
use crate::reply::Reply;
use std::path::Path;
use tracing::{debug, info};

pub struct SystemCommands<'a> {
    brick: &'a Brick,
}

impl<'a> SystemCommands<'a> {
    pub(crate) fn new(brick: &'a Brick) -> Self {
        Self { brick }
    }

    async fn request(&self, command: &Command) -> Result<Reply> {
        self.brick.execute(command).await?.into_reply()
    }

    /// Sends a single system command that must answer with success.
    async fn request_success(&self, opcode: SystemOpcode, command: &Command) -> Result<Reply> {
        let reply = self.request(command).await?;
        let status = reply.system_status();
        if status != SystemReplyStatus::Success {
            return Err(Ev3Error::SystemCommandFailed {
                opcode: reply.system_opcode.unwrap_or(opcode),
                status,
            });
        }
        Ok(reply)
    }

    /// Uploads `data` to `device_path`, overwriting any existing file.
    ///
    /// The transfer opens a download handle, then streams the data in chunks
    /// of at most 960 bytes. The brick answers the chunk completing the file
    /// with either success or end-of-file; any other status aborts. The
    /// handle is not closed explicitly afterwards.
    pub async fn write_file(&self, data: &[u8], device_path: &str) -> Result<()> {
        let file_size = u32::try_from(data.len())
            .map_err(|_| Ev3Error::out_of_range("file size", data.len() as i64, 0, u32::MAX))?;

        let mut begin = Command::new(CommandType::SystemReply);
        begin.begin_download(file_size, device_path);
        let reply = self.request_success(SystemOpcode::BeginDownload, &begin).await?;
        let handle = *reply.data.first().ok_or(Ev3Error::InsufficientData {
            expected: 1,
            actual: 0,
        })?;
        info!(device_path, file_size, handle, "Download started");

        let mut sent = 0usize;
        for chunk in data.chunks(FILE_CHUNK_SIZE) {
            let mut next = Command::new(CommandType::SystemReply);
            next.continue_download(handle, chunk);
            let reply = self.request(&next).await?;
            sent += chunk.len();

            match reply.system_status() {
                SystemReplyStatus::Success => {}
                SystemReplyStatus::EndOfFile if sent == data.len() => {}
                status => {
                    return Err(Ev3Error::SystemCommandFailed {
                        opcode: SystemOpcode::ContinueDownload,
                        status,
                    });
                }
            }
            debug!(sent, total = data.len(), "Chunk accepted");
        }

        info!(device_path, "Download complete");
        Ok(())
    }

    /// Reads `local_path` and uploads it to `device_path`.
    pub async fn copy_file(&self, local_path: impl AsRef<Path>, device_path: &str) -> Result<()> {
        let data = tokio::fs::read(local_path.as_ref()).await?;
        self.write_file(&data, device_path).await
    }

    pub async fn delete_file(&self, device_path: &str) -> Result<()> {
        let mut command = Command::new(CommandType::SystemReply);
        command.delete_file(device_path);
        self.request_success(SystemOpcode::DeleteFile, &command).await?;
        Ok(())
    }

    pub async fn create_directory(&self, device_path: &str) -> Result<()> {
        let mut command = Command::new(CommandType::SystemReply);
        command.create_directory(device_path);
        self.request_success(SystemOpcode::CreateDirectory, &command).await?;
        Ok(())
    }
}
