//! Blocking futures over queued requests.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{url, wait_until, MockTransport};
use courier_core::{
    Courier, ErrorKind, FutureError, Method, Request, RequestFuture, RequestQueue,
    RequestQueueConfig, RuntimeTarget,
};

fn courier(workers: usize) -> Courier {
    let transport = Arc::new(MockTransport::new());
    Courier::with_transport(transport, RequestQueueConfig { worker_count: workers }).unwrap()
}

#[test]
fn get_zero_on_completed_request_returns_immediately() {
    let courier = courier(1);
    courier.start().unwrap();
    let future = courier.fetch(Request::text(Method::Get, url("/done"))).unwrap();
    wait_until("future to complete", || future.is_done());

    let started = Instant::now();
    assert_eq!(future.get(0).unwrap(), "/done");
    assert!(started.elapsed() < Duration::from_millis(50));
    courier.shutdown();
}

#[test]
fn get_hundred_on_request_that_never_completes_times_out() {
    // Submitted but never dispatched: the queue is not started.
    let courier = courier(1);
    let future = courier.fetch(Request::text(Method::Get, url("/never"))).unwrap();

    let started = Instant::now();
    let err = future.get(100).unwrap_err();
    assert!(err.is_timeout());
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(!future.is_done());
}

#[test]
fn failed_request_surfaces_request_error() {
    let courier = courier(1);
    courier.start().unwrap();
    let future = courier.fetch(Request::text(Method::Get, url("/status/503"))).unwrap();

    match future.get(2_000) {
        Err(FutureError::Failed(e)) => {
            assert_eq!(e.kind(), ErrorKind::Status);
            assert_eq!(e.status_code(), Some(503));
        }
        other => panic!("expected status failure, got {:?}", other),
    }
    courier.shutdown();
}

#[test]
fn cancel_through_future_wakes_waiter_and_skips_dispatch() {
    let courier = courier(1);
    let future = Arc::new(courier.fetch(Request::text(Method::Get, url("/slow/1"))).unwrap());

    let waiter = {
        let future = future.clone();
        std::thread::spawn(move || future.get(0))
    };
    assert!(future.cancel());
    assert!(matches!(waiter.join().unwrap(), Err(FutureError::Cancelled)));

    courier.start().unwrap();
    wait_until("canceled request release", || courier.queue.in_flight_count() == 0);
    courier.shutdown();
}

#[test]
fn negative_timeout_is_rejected() {
    let courier = courier(1);
    let future = courier.fetch(Request::text(Method::Get, url("/x"))).unwrap();
    assert!(matches!(future.get(-5), Err(FutureError::NegativeTimeout(-5))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runtime_target_delivers_on_tokio() {
    let target = Arc::new(RuntimeTarget::current().expect("inside a runtime"));
    let queue = RequestQueue::new(
        Arc::new(MockTransport::new()),
        target,
        RequestQueueConfig { worker_count: 2 },
    );
    queue.start().unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = parking_lot::Mutex::new(Some(tx));
    let request = Request::text(Method::Get, url("/rt")).on_success(move |body| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(body);
        }
    });
    queue.submit(Arc::new(request)).unwrap();

    let body = tokio::time::timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    assert_eq!(body, "/rt");
    queue.stop();
}

#[test]
fn install_keeps_existing_listener() {
    let courier = courier(1);
    courier.start().unwrap();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let s = seen.clone();
    let request = Request::text(Method::Get, url("/both")).on_success(move |b| s.lock().push(b));

    let mut future = RequestFuture::new();
    let request = Arc::new(future.install(request));
    future.attach(request.clone());
    courier.queue.submit(request).unwrap();

    assert_eq!(future.wait().unwrap(), "/both");
    assert_eq!(*seen.lock(), vec!["/both".to_string()]);
    courier.shutdown();
}

#[test]
fn panicking_caller_listener_does_not_strand_future() {
    let courier = courier(1);
    courier.start().unwrap();
    let request = Request::text(Method::Get, url("/ok")).on_success(|_| panic!("caller listener"));
    let future = courier.fetch(request).unwrap();

    assert_eq!(future.get(2_000).unwrap(), "/ok");
    assert!(future.is_done());
    assert!(!future.cancel());
    wait_until("request release", || courier.queue.in_flight_count() == 0);
    courier.shutdown();
}
