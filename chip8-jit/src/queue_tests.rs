use super::*;
use std::thread;
use std::time::Duration;

fn request(target: u16) -> CompileRequest {
    CompileRequest {
        target,
        image: Arc::from(vec![0u8; 4]),
    }
}

#[test]
fn test_fifo_order() {
    let queue = CompileQueue::new();
    assert!(queue.push(request(0x300)));
    assert!(queue.push(request(0x400)));
    assert_eq!(queue.len(), 2);
    assert_eq!(queue.next().map(|r| r.target), Some(0x300));
    assert_eq!(queue.next().map(|r| r.target), Some(0x400));
}

#[test]
fn test_close_wakes_blocked_consumer() {
    let queue = Arc::new(CompileQueue::new());
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.next().is_none())
    };
    thread::sleep(Duration::from_millis(20));
    queue.close();
    assert!(consumer.join().unwrap());
    assert!(!queue.push(request(0x300)));
}

#[test]
fn test_wait_idle_waits_for_consumer() {
    let queue = Arc::new(CompileQueue::new());
    queue.push(request(0x300));
    queue.push(request(0x302));

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut seen = 0;
            while queue.next().is_some() {
                seen += 1;
            }
            seen
        })
    };

    queue.wait_idle();
    assert_eq!(queue.len(), 0);
    queue.close();
    assert_eq!(consumer.join().unwrap(), 2);
}

#[test]
fn test_clear_keeps_queue_open() {
    let queue = CompileQueue::new();
    assert!(queue.push(request(0x300)));
    assert!(queue.push(request(0x400)));
    assert_eq!(queue.clear(), 2);
    assert_eq!(queue.len(), 0);

    // nothing pending or in progress
    queue.wait_idle();

    assert!(queue.push(request(0x500)));
    assert_eq!(queue.next().map(|r| r.target), Some(0x500));
}
