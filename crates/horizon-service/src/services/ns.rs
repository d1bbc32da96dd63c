//! `ns:s`, title launching and power control.

use horizon_ipc::{RequestParser, RESULT_SUCCESS};
use horizon_kernel::ObjectId;

use crate::error::ServiceError;
use crate::framework::{FunctionInfo, HleEnv, ServiceModule};

/// Storage a title is installed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MediaType {
    Nand = 0,
    Sdmc = 1,
    GameCard = 2,
}

impl MediaType {
    /// Where a title id is installed: system titles, DLP children and anything not for the
    /// handheld platform live on NAND, everything else on the SD card.
    pub fn for_title(title_id: u64) -> Self {
        let platform = (title_id >> 48) as u16;
        let category = (title_id >> 32) as u16;
        let variation = title_id as u8;

        if platform != 0x0004 {
            return MediaType::Nand;
        }
        if category & 0x10 != 0 || category & 0x1 != 0 {
            return MediaType::Nand;
        }
        // DLP child
        if variation & 0x02 != 0 {
            return MediaType::Nand;
        }
        MediaType::Sdmc
    }
}

impl From<MediaType> for u32 {
    fn from(media: MediaType) -> Self {
        media as u32
    }
}

/// Deferred power and launch requests, delivered to whatever drives the run loop.
pub trait SystemControl {
    /// Asks for the running title to be replaced. Title id 0 reloads the current binary.
    fn request_jump(&self, media: MediaType, title_id: u64);

    fn request_shutdown(&self);
}

pub struct NsS {
    control: Box<dyn SystemControl>,
}

impl NsS {
    pub fn new(control: Box<dyn SystemControl>) -> Self {
        Self { control }
    }

    fn launch_title(
        &mut self,
        _session: &mut (),
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let title_id: u64 = rp.pop();
        let flags: u32 = rp.pop();
        let media = MediaType::for_title(title_id);
        tracing::debug!(
            title_id = format_args!("0x{title_id:016X}"),
            flags,
            ?media,
            "LaunchTitle"
        );
        self.control.request_jump(media, title_id);

        // The new process only exists after the jump, so no id can be reported.
        rp.make_builder(2, 0).push(RESULT_SUCCESS).push(0u32);
        Ok(())
    }

    fn shutdown_async(
        &mut self,
        _session: &mut (),
        rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        tracing::debug!("ShutdownAsync");
        self.control.request_shutdown();
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }

    fn reboot_system_clean(
        &mut self,
        _session: &mut (),
        rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        tracing::debug!("RebootSystemClean");
        self.control.request_jump(MediaType::Nand, 0);
        rp.make_builder(1, 0).push(RESULT_SUCCESS);
        Ok(())
    }
}

impl ServiceModule for NsS {
    type Session = ();
    const NAME: &'static str = "ns:s";
    const MAX_SESSIONS: u32 = 3;

    fn handlers() -> Vec<FunctionInfo<Self>> {
        vec![
            FunctionInfo::stub(0x0001_00C0, "LaunchFIRM"),
            FunctionInfo::handler(0x0002_00C0, Self::launch_title, "LaunchTitle"),
            FunctionInfo::stub(0x0003_0000, "TerminateApplication"),
            FunctionInfo::stub(0x0004_0040, "TerminateProcess"),
            FunctionInfo::stub(0x0005_00C0, "LaunchApplicationFIRM"),
            FunctionInfo::stub(0x0006_0042, "SetFIRMParams4A0"),
            FunctionInfo::stub(0x0007_0042, "CardUpdateInitialize"),
            FunctionInfo::stub(0x0008_0000, "CardUpdateShutdown"),
            FunctionInfo::stub(0x000D_0140, "SetTWLBannerHMAC"),
            FunctionInfo::handler(0x000E_0000, Self::shutdown_async, "ShutdownAsync"),
            FunctionInfo::stub(0x0010_0180, "RebootSystem"),
            FunctionInfo::stub(0x0011_0100, "TerminateTitle"),
            FunctionInfo::stub(0x0012_00C0, "SetApplicationCpuTimeLimit"),
            FunctionInfo::stub(0x0015_0140, "LaunchApplication"),
            FunctionInfo::handler(0x0016_0000, Self::reboot_system_clean, "RebootSystemClean"),
        ]
    }
}
