use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use upscale_core::UpscaleError;
use upscale_core::core::{BoundedQueue, QueueClosed, QueueRecv};

#[test]
fn rejects_zero_capacity() {
    assert!(matches!(
        BoundedQueue::<u32>::new(0),
        Err(UpscaleError::InvalidConfig(_))
    ));
}

#[test]
fn delivers_items_in_fifo_order() -> Result<(), Box<dyn std::error::Error>> {
    let (producer, consumer) = BoundedQueue::new(8)?.split();
    for value in 0..8u32 {
        producer.put(value).map_err(|_| "queue closed")?;
    }
    assert_eq!(producer.len(), 8);

    let drained: Vec<u32> = (0..8).filter_map(|_| consumer.get()).collect();
    assert_eq!(drained, (0..8).collect::<Vec<_>>());
    assert!(consumer.is_empty());
    Ok(())
}

#[test]
fn put_blocks_while_full() -> Result<(), Box<dyn std::error::Error>> {
    let (producer, consumer) = BoundedQueue::new(2)?.split();
    producer.put(1u32).map_err(|_| "queue closed")?;
    producer.put(2u32).map_err(|_| "queue closed")?;

    let third_queued = Arc::new(AtomicBool::new(false));
    let blocked = {
        let third_queued = Arc::clone(&third_queued);
        thread::spawn(move || {
            let result = producer.put(3u32);
            third_queued.store(true, Ordering::SeqCst);
            result.is_ok()
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!third_queued.load(Ordering::SeqCst));

    assert_eq!(consumer.get(), Some(1));
    assert!(blocked.join().map_err(|_| "producer panicked")?);
    assert!(third_queued.load(Ordering::SeqCst));
    assert_eq!(consumer.get(), Some(2));
    assert_eq!(consumer.get(), Some(3));
    Ok(())
}

#[test]
fn get_drains_remaining_items_after_producers_hang_up() -> Result<(), Box<dyn std::error::Error>> {
    let (producer, consumer) = BoundedQueue::new(4)?.split();
    producer.put("a").map_err(|_| "queue closed")?;
    producer.put("b").map_err(|_| "queue closed")?;
    drop(producer);

    assert_eq!(consumer.get(), Some("a"));
    assert_eq!(consumer.try_get(), QueueRecv::Item("b"));
    assert_eq!(consumer.get(), None);
    assert_eq!(
        consumer.get_timeout(Duration::from_millis(10)),
        QueueRecv::Closed
    );
    Ok(())
}

#[test]
fn put_hands_item_back_once_consumers_are_gone() -> Result<(), Box<dyn std::error::Error>> {
    let (producer, consumer) = BoundedQueue::new(1)?.split();
    drop(consumer);
    assert_eq!(producer.put(7u8), Err(QueueClosed(7)));
    Ok(())
}

#[test]
fn get_timeout_reports_empty_queue() -> Result<(), Box<dyn std::error::Error>> {
    let (_producer, consumer) = BoundedQueue::<u8>::new(1)?.split();
    assert_eq!(
        consumer.get_timeout(Duration::from_millis(20)),
        QueueRecv::Empty
    );
    assert_eq!(consumer.try_get(), QueueRecv::Empty);
    Ok(())
}
