use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ToolWindowError;
use crate::host::{
    ContextArgs, HostCommand, HostTransport, OpenToolWindowArgs, RestoreToolWindowArgs,
    WindowHandleArgs,
};
use crate::record::{ContextKey, ToolWindowRecord, WindowPosition, WindowSize};
use crate::tool_registry::ToolKind;

/// Issues one host command per call and reports exactly what the host said.
///
/// There is no queueing and no retry: a retried command could act on a window
/// the user has since closed by hand.
pub struct CommandGateway<T> {
    transport: T,
    timeout: Duration,
}

impl<T: HostTransport> CommandGateway<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub async fn open(
        &self,
        kind: ToolKind,
        context: &ContextKey,
        position: WindowPosition,
        size: WindowSize,
    ) -> Result<ToolWindowRecord, ToolWindowError> {
        let spec = kind.spec();
        let args = OpenToolWindowArgs {
            tool_kind: kind,
            book_id: context.book_id.clone(),
            version_id: context.version_id.clone(),
            title: spec.title.to_string(),
            icon_ref: Some(spec.icon.to_string()),
            position,
            size,
        };
        let record: ToolWindowRecord = self
            .call(HostCommand::OpenToolWindow, &args, None)
            .await?;
        if !record.identity_matches() || !context.matches(&record) || record.tool_kind != kind {
            return Err(ToolWindowError::InvalidPayload(format!(
                "open_tool_window answered with {} for {} in {context}",
                record.id, kind
            )));
        }
        Ok(record)
    }

    pub async fn dock(&self, id: &str, host_handle: Option<&str>) -> Result<(), ToolWindowError> {
        let args = WindowHandleArgs {
            id: id.to_string(),
            host_handle: host_handle.map(str::to_string),
        };
        self.call_unit(HostCommand::MinimizeToolWindow, &args, Some(id))
            .await
    }

    pub async fn undock(
        &self,
        id: &str,
        host_handle: Option<&str>,
        position: WindowPosition,
        size: WindowSize,
    ) -> Result<(), ToolWindowError> {
        let args = RestoreToolWindowArgs {
            id: id.to_string(),
            host_handle: host_handle.map(str::to_string),
            position,
            size,
        };
        self.call_unit(HostCommand::RestoreToolWindow, &args, Some(id))
            .await
    }

    pub async fn close(&self, id: &str, host_handle: Option<&str>) -> Result<(), ToolWindowError> {
        let args = WindowHandleArgs {
            id: id.to_string(),
            host_handle: host_handle.map(str::to_string),
        };
        self.call_unit(HostCommand::CloseToolWindow, &args, Some(id))
            .await
    }

    pub async fn close_all(&self, context: &ContextKey) -> Result<(), ToolWindowError> {
        self.call_unit(HostCommand::CloseAllTools, &context_args(context), None)
            .await
    }

    pub async fn list_for_context(
        &self,
        context: &ContextKey,
    ) -> Result<Vec<ToolWindowRecord>, ToolWindowError> {
        self.call(
            HostCommand::GetToolWindowsState,
            &context_args(context),
            None,
        )
        .await
    }

    async fn call_unit<A: Serialize>(
        &self,
        command: HostCommand,
        args: &A,
        window_id: Option<&str>,
    ) -> Result<(), ToolWindowError> {
        self.invoke(command, args, window_id).await.map(|_| ())
    }

    async fn call<A: Serialize, R: DeserializeOwned>(
        &self,
        command: HostCommand,
        args: &A,
        window_id: Option<&str>,
    ) -> Result<R, ToolWindowError> {
        let value = self.invoke(command, args, window_id).await?;
        serde_json::from_value(value).map_err(|error| {
            ToolWindowError::InvalidPayload(format!("{} response: {error}", command.as_str()))
        })
    }

    async fn invoke<A: Serialize>(
        &self,
        command: HostCommand,
        args: &A,
        window_id: Option<&str>,
    ) -> Result<Value, ToolWindowError> {
        let args = serde_json::to_value(args).map_err(|error| {
            ToolWindowError::InvalidPayload(format!("{} arguments: {error}", command.as_str()))
        })?;
        tracing::debug!(command = command.as_str(), window_id = ?window_id, "host command issued");

        let result = match tokio::time::timeout(self.timeout, self.transport.invoke(command, args))
            .await
        {
            Ok(result) => result.map_err(|fault| ToolWindowError::from_host_fault(fault, window_id)),
            Err(_) => Err(ToolWindowError::HostUnavailable(format!(
                "{} timed out after {}ms",
                command.as_str(),
                self.timeout.as_millis()
            ))),
        };

        if let Err(error) = &result {
            tracing::warn!(
                command = command.as_str(),
                window_id = ?window_id,
                code = error.code(),
                reason = %error,
                "host command failed"
            );
        }
        result
    }
}

fn context_args(context: &ContextKey) -> ContextArgs {
    ContextArgs {
        book_id: context.book_id.clone(),
        version_id: context.version_id.clone(),
    }
}
