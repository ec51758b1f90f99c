/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::marker::PhantomData;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::common::{Result, ServiceReply};
use crate::message::{DispatchError, MessageType};

/// The pending reply of a service request.
///
/// The reply arrives when the handler finishes. If the demand is discarded
/// before that (abandoning shutdown, deregistration, a dropped queue) the
/// request resolves to `ServiceRequestCanceled` instead of hanging.
///
/// [`wait`](Self::wait) and [`wait_for`](Self::wait_for) block the calling
/// thread and must not be used inside an async runtime; use
/// [`recv`](Self::recv) there.
#[derive(Debug)]
#[must_use = "a service request does nothing unless its reply is awaited"]
pub struct ServiceRequest<R> {
    receiver: oneshot::Receiver<ServiceReply>,
    message_type: MessageType,
    _reply: PhantomData<fn() -> R>,
}

impl<R: Send + 'static> ServiceRequest<R> {
    pub(crate) fn new(
        receiver: oneshot::Receiver<ServiceReply>,
        message_type: MessageType,
    ) -> Self {
        Self {
            receiver,
            message_type,
            _reply: PhantomData,
        }
    }

    /// The request's message type.
    pub const fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Blocks until the reply arrives or the request is canceled.
    pub fn wait(self) -> Result<R> {
        let message_type = self.message_type;
        let reply = self.receiver.blocking_recv().map_err(|_| canceled(message_type))?;
        unpack(reply, message_type)
    }

    /// Blocks until the reply arrives, the request is canceled, or `timeout`
    /// elapses.
    pub fn wait_for(self, timeout: Duration) -> Result<R> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(self.recv_timeout(timeout))
    }

    /// Awaits the reply.
    pub async fn recv(self) -> Result<R> {
        let message_type = self.message_type;
        let reply = self.receiver.await.map_err(|_| canceled(message_type))?;
        unpack(reply, message_type)
    }

    /// Awaits the reply for at most `timeout`.
    pub async fn recv_timeout(self, timeout: Duration) -> Result<R> {
        let message_type = self.message_type;
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(reply)) => unpack(reply, message_type),
            Ok(Err(_)) => Err(canceled(message_type)),
            Err(_) => Err(DispatchError::ServiceRequestTimeout {
                message_type: message_type.name(),
                timeout,
            }),
        }
    }
}

const fn canceled(message_type: MessageType) -> DispatchError {
    DispatchError::ServiceRequestCanceled {
        message_type: message_type.name(),
    }
}

fn unpack<R: 'static>(reply: ServiceReply, message_type: MessageType) -> Result<R> {
    reply?
        .downcast::<R>()
        .map(|value| *value)
        .map_err(|_| DispatchError::ReplyTypeMismatch {
            message_type: message_type.name(),
            expected: std::any::type_name::<R>(),
        })
}
