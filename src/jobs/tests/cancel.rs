use super::*;
use crate::types::{Event, Provider};

#[tokio::test]
async fn sole_observer_can_cancel_before_packaging() {
    let h = harness(|_| {}).await;
    h.deezer.set_resolution(vec![track(Provider::Deezer, "1")]);
    h.deezer.set_delay("1", Duration::from_millis(400));

    let mut events = h.manager.subscribe();
    let ticket = h.manager.submit(request(TRACK_URL)).await.unwrap();
    let id = ticket.id();

    tokio::time::sleep(Duration::from_millis(100)).await;
    h.manager.cancel(id).await.unwrap();

    let err = ticket.wait().await.unwrap_err();
    assert!(matches!(&*err, crate::error::Error::Cancelled));

    let mut cancelled = false;
    while let Ok(Ok(event)) =
        tokio::time::timeout(Duration::from_millis(100), events.recv()).await
    {
        if matches!(event, Event::Cancelled { id: e } if e == id) {
            cancelled = true;
        }
    }
    assert!(cancelled, "a Cancelled event reaches subscribers");
}

#[tokio::test]
async fn cancelling_a_finished_job_is_not_found() {
    let h = harness(|_| {}).await;
    h.deezer.set_resolution(vec![track(Provider::Deezer, "1")]);

    let ticket = h.manager.submit(request(TRACK_URL)).await.unwrap();
    let id = ticket.id();
    ticket.wait().await.unwrap();

    assert!(matches!(
        h.manager.cancel(id).await,
        Err(crate::error::Error::JobNotFound(_))
    ));
}

#[tokio::test]
async fn a_job_with_two_observers_cannot_be_cancelled() {
    let h = harness(|_| {}).await;
    h.deezer.set_resolution(vec![track(Provider::Deezer, "1")]);
    h.deezer.set_delay("1", Duration::from_millis(300));

    let first = h.manager.submit(request(TRACK_URL)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = h.manager.submit(request(TRACK_URL)).await.unwrap();
    assert_eq!(first.id(), second.id());

    assert!(matches!(
        h.manager.cancel(first.id()).await,
        Err(crate::error::Error::InvalidState { .. })
    ));

    first.wait().await.unwrap();
    second.wait().await.unwrap();
}
