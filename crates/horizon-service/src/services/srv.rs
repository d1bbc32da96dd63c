//! `srv:`, the service manager port every process connects to first.

use horizon_ipc::{
    ErrorDescription, ErrorLevel, ErrorModule, ErrorSummary, RequestParser, ResultCode,
    RESULT_SUCCESS,
};
use horizon_kernel::{Kernel, KernelError, ObjectId, PortKind};

use crate::error::ServiceError;
use crate::framework::{FunctionInfo, HleEnv, ServiceModule};

pub const ERR_SERVICE_NOT_REGISTERED: ResultCode = ResultCode::new(
    ErrorDescription(1),
    ErrorModule::Srv,
    ErrorSummary::WouldBlock,
    ErrorLevel::Temporary,
);

pub const ERR_INVALID_NAME_SIZE: ResultCode = ResultCode::new(
    ErrorDescription(5),
    ErrorModule::Srv,
    ErrorSummary::WrongArgument,
    ErrorLevel::Permanent,
);

const ERR_INVALID_BUFFER_DESCRIPTOR: ResultCode = ResultCode::new(
    ErrorDescription::OS_INVALID_BUFFER_DESCRIPTOR,
    ErrorModule::Os,
    ErrorSummary::WrongArgument,
    ErrorLevel::Permanent,
);

const MAX_PENDING_NOTIFICATIONS: i32 = 16;
const MAX_NAME_LENGTH: u32 = 8;

#[derive(Debug, Default)]
pub struct SrvSession {
    pub registered: bool,
    pub notifications_enabled: bool,
}

#[derive(Debug, Default)]
pub struct Srv {
    notification_semaphore: Option<ObjectId>,
}

impl Srv {
    pub fn new() -> Self {
        Self::default()
    }

    fn register_client(
        &mut self,
        session: &mut SrvSession,
        mut rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let result = match rp.pop_pid() {
            Ok(pid) => {
                session.registered = true;
                tracing::debug!(pid, "RegisterClient");
                RESULT_SUCCESS
            }
            Err(err) => {
                tracing::error!(%err, "RegisterClient without a calling-pid descriptor");
                ERR_INVALID_BUFFER_DESCRIPTOR
            }
        };
        rp.make_builder(1, 0).push(result);
        Ok(())
    }

    fn enable_notification(
        &mut self,
        session: &mut SrvSession,
        rp: RequestParser<'_, ObjectId>,
        _env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        session.notifications_enabled = true;
        rp.make_builder(1, 2)
            .push(RESULT_SUCCESS)
            .push_copy_objects(&[self.notification_semaphore]);
        tracing::warn!("(STUBBED) EnableNotification");
        Ok(())
    }

    fn get_service_handle(
        &mut self,
        _session: &mut SrvSession,
        mut rp: RequestParser<'_, ObjectId>,
        env: &mut HleEnv<'_>,
    ) -> Result<(), ServiceError> {
        let raw_name: [u8; 8] = rp.pop();
        let name_len: u32 = rp.pop();
        let flags: u32 = rp.pop();

        if name_len > MAX_NAME_LENGTH {
            tracing::error!(name_len, "GetServiceHandle name is too long");
            rp.make_builder(1, 0).push(ERR_INVALID_NAME_SIZE);
            return Ok(());
        }
        let name = String::from_utf8_lossy(&raw_name[..name_len as usize]).into_owned();

        match env.kernel.connect_to_port(&name, PortKind::Service) {
            Ok(client) => {
                tracing::debug!(service = %name, flags, "GetServiceHandle");
                rp.make_builder(1, 2)
                    .push(RESULT_SUCCESS)
                    .push_move_objects(&[Some(client)]);
            }
            Err(err) => {
                let result = match err {
                    KernelError::PortNotFound(_) => ERR_SERVICE_NOT_REGISTERED,
                    other => other.result_code(),
                };
                tracing::error!(service = %name, %result, "GetServiceHandle failed");
                rp.make_builder(1, 0).push(result);
            }
        }
        Ok(())
    }
}

impl ServiceModule for Srv {
    type Session = SrvSession;
    const NAME: &'static str = "srv:";
    const MAX_SESSIONS: u32 = 4;
    const PORT: PortKind = PortKind::Named;

    fn handlers() -> Vec<FunctionInfo<Self>> {
        vec![
            FunctionInfo::handler(0x0001_0002, Self::register_client, "RegisterClient"),
            FunctionInfo::handler(0x0002_0000, Self::enable_notification, "EnableNotification"),
            FunctionInfo::stub(0x0003_0100, "RegisterService"),
            FunctionInfo::stub(0x0004_00C0, "UnregisterService"),
            FunctionInfo::handler(0x0005_0100, Self::get_service_handle, "GetServiceHandle"),
            FunctionInfo::stub(0x0006_00C2, "RegisterPort"),
            FunctionInfo::stub(0x0007_00C0, "UnregisterPort"),
            FunctionInfo::stub(0x0008_0100, "GetPort"),
            FunctionInfo::stub(0x0009_0040, "Subscribe"),
            FunctionInfo::stub(0x000A_0040, "Unsubscribe"),
            FunctionInfo::stub(0x000B_0000, "ReceiveNotification"),
            FunctionInfo::stub(0x000C_0080, "PublishToSubscriber"),
            FunctionInfo::stub(0x000D_0040, "PublishAndGetSubscriber"),
            FunctionInfo::stub(0x000E_00C0, "IsServiceRegistered"),
        ]
    }

    fn install(&mut self, kernel: &mut Kernel) -> Result<(), KernelError> {
        let semaphore =
            kernel.create_semaphore(0, MAX_PENDING_NOTIFICATIONS, "SRV:Notification")?;
        self.notification_semaphore = Some(semaphore);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srv_results_are_wire_exact() {
        assert_eq!(ERR_SERVICE_NOT_REGISTERED.raw(), 0xD040_6401);
        assert_eq!(ERR_INVALID_NAME_SIZE.raw(), 0xD900_6405);
    }
}
