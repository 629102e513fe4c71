//! Instance Dispatch
//!
//! Context side of a single remote actor instance: run the factory, report
//! the handshake, then answer calls until the caller goes away.
//!
//! Every call runs as its own local task. A slow method therefore never
//! holds up the others, and responses go out in completion order.

use crate::error::ErrorValue;
use crate::messages::{decode, Args, CallRequest, CallResponse, SpawnResult};
use crate::system::{ActorDefinition, MethodTable};
use crate::transport::{Port, PortSender};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Construct an instance and serve it over `port`
pub(crate) async fn serve_instance(
    definition: ActorDefinition,
    args: Args,
    port: Port,
    context: String,
) {
    let actor_id = definition.id().to_string();

    let constructed = AssertUnwindSafe(definition.instantiate(args))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(ErrorValue::from_panic(payload)));

    let table = match constructed {
        Ok(table) => table,
        Err(error) => {
            warn!(
                context = %context,
                actor_id = %actor_id,
                error = %error,
                "Actor constructor failed"
            );
            if let Err(e) = port.post_message(&SpawnResult::failed(error)) {
                debug!(
                    context = %context,
                    actor_id = %actor_id,
                    error = %e,
                    "Caller gone before spawn result"
                );
            }
            return;
        }
    };

    let (sender, mut receiver) = port.split();
    if let Err(e) = sender.post_message(&SpawnResult::ok()) {
        debug!(
            context = %context,
            actor_id = %actor_id,
            error = %e,
            "Caller gone before spawn result"
        );
        return;
    }
    debug!(
        context = %context,
        actor_id = %actor_id,
        methods = ?table.names(),
        "Actor instance ready"
    );

    let table = Rc::new(table);
    while let Some(frame) = receiver.recv_frame().await {
        let request: CallRequest = match decode(&frame) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    context = %context,
                    actor_id = %actor_id,
                    error = %e,
                    "Dropping undecodable call request"
                );
                continue;
            }
        };
        tokio::task::spawn_local(answer_call(Rc::clone(&table), sender.clone(), request));
    }

    debug!(context = %context, actor_id = %actor_id, "Actor instance released");
}

/// Run one method and post its outcome
async fn answer_call(table: Rc<MethodTable>, sender: PortSender, request: CallRequest) {
    let CallRequest {
        call_id,
        method,
        args,
    } = request;
    trace!(call_id, method = %method, "Invoking actor method");

    let outcome = AssertUnwindSafe(table.call(&method, args))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(ErrorValue::from_panic(payload)));

    if let Err(error) = &outcome {
        debug!(call_id, method = %method, error = %error, "Actor method failed");
    }

    if let Err(e) = sender.post_message(&CallResponse::from_outcome(call_id, outcome)) {
        debug!(call_id, method = %method, error = %e, "Caller gone before call response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::encode_args;
    use crate::transport::MessageChannel;
    use serde_json::json;
    use std::time::Duration;
    use tokio::task::LocalSet;

    fn request(call_id: u64, method: &str, args: Args) -> CallRequest {
        CallRequest {
            call_id,
            method: method.to_string(),
            args,
        }
    }

    fn worker() -> ActorDefinition {
        ActorDefinition::new("worker", |_| {
            Ok(MethodTable::new()
                .async_method("sleep", |args: Args| async move {
                    let (ms,): (u64,) = args.decode()?;
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok::<_, ErrorValue>(ms)
                })
                .method("fail", |_| Err::<(), _>(ErrorValue::from("nope")))
                .method("panic", |_| -> Result<(), ErrorValue> { panic!("kaboom") }))
        })
    }

    #[tokio::test]
    async fn test_constructor_error_is_reported_once() {
        LocalSet::new()
            .run_until(async {
                let definition = ActorDefinition::new("bad", |_| Err(ErrorValue::from("boom")));
                let MessageChannel { port1, mut port2 } = MessageChannel::new();

                serve_instance(definition, Args::empty(), port1, "ctx".to_string()).await;

                let result: SpawnResult = port2.recv_message().await.unwrap().unwrap();
                assert_eq!(result, SpawnResult::failed(ErrorValue::from("boom")));
                assert!(port2.recv_message::<SpawnResult>().await.is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn test_constructor_panic_is_reported() {
        LocalSet::new()
            .run_until(async {
                let definition =
                    ActorDefinition::new("panicky", |_| -> Result<MethodTable, ErrorValue> {
                        panic!("constructor exploded")
                    });
                let MessageChannel { port1, mut port2 } = MessageChannel::new();

                serve_instance(definition, Args::empty(), port1, "ctx".to_string()).await;

                let result: SpawnResult = port2.recv_message().await.unwrap().unwrap();
                let error = result.error.unwrap();
                assert_eq!(error.kind, crate::error::KIND_PANIC);
                assert_eq!(error.message, "constructor exploded");
            })
            .await;
    }

    #[tokio::test]
    async fn test_slow_call_does_not_block_fast_call() {
        LocalSet::new()
            .run_until(async {
                let MessageChannel { port1, mut port2 } = MessageChannel::new();
                tokio::task::spawn_local(serve_instance(
                    worker(),
                    Args::empty(),
                    port1,
                    "ctx".to_string(),
                ));

                let ready: SpawnResult = port2.recv_message().await.unwrap().unwrap();
                assert_eq!(ready, SpawnResult::ok());

                port2
                    .post_message(&request(0, "sleep", encode_args((200u64,)).unwrap()))
                    .unwrap();
                port2
                    .post_message(&request(1, "sleep", encode_args((1u64,)).unwrap()))
                    .unwrap();

                let first: CallResponse = port2.recv_message().await.unwrap().unwrap();
                let second: CallResponse = port2.recv_message().await.unwrap().unwrap();
                assert_eq!(first, CallResponse::success(1, json!(1)));
                assert_eq!(second, CallResponse::success(0, json!(200)));
            })
            .await;
    }

    #[tokio::test]
    async fn test_failures_become_error_responses() {
        LocalSet::new()
            .run_until(async {
                let MessageChannel { port1, mut port2 } = MessageChannel::new();
                tokio::task::spawn_local(serve_instance(
                    worker(),
                    Args::empty(),
                    port1,
                    "ctx".to_string(),
                ));
                let _: SpawnResult = port2.recv_message().await.unwrap().unwrap();

                let mut responses = Vec::new();
                for (call_id, method) in ["fail", "panic", "missingMethod"].iter().enumerate() {
                    port2
                        .post_message(&request(call_id as u64, method, Args::empty()))
                        .unwrap();
                    let response: CallResponse = port2.recv_message().await.unwrap().unwrap();
                    responses.push(response);
                }

                assert_eq!(responses[0], CallResponse::failure(0, ErrorValue::from("nope")));
                assert_eq!(responses[1].error.as_ref().unwrap().message, "kaboom");
                assert!(responses[2].error.as_ref().unwrap().is_type_error());

                // The instance keeps serving after every kind of failure
                port2
                    .post_message(&request(3, "sleep", encode_args((0u64,)).unwrap()))
                    .unwrap();
                let response: CallResponse = port2.recv_message().await.unwrap().unwrap();
                assert_eq!(response, CallResponse::success(3, json!(0)));
            })
            .await;
    }

    #[tokio::test]
    async fn test_undecodable_request_is_skipped() {
        LocalSet::new()
            .run_until(async {
                let MessageChannel { port1, mut port2 } = MessageChannel::new();
                tokio::task::spawn_local(serve_instance(
                    worker(),
                    Args::empty(),
                    port1,
                    "ctx".to_string(),
                ));
                let _: SpawnResult = port2.recv_message().await.unwrap().unwrap();

                port2.post_message(&json!({"garbage": true})).unwrap();
                port2
                    .post_message(&request(7, "sleep", encode_args((0u64,)).unwrap()))
                    .unwrap();

                let response: CallResponse = port2.recv_message().await.unwrap().unwrap();
                assert_eq!(response.call_id, 7);
            })
            .await;
    }
}
