use pthread_rs_core::errno::ENOTSUP;
use pthread_rs_core::{MutexKind, Runtime, ThreadError, UnsupportedOp};

#[test]
fn gate_rejects_every_op_with_enotsup() {
    let rt = Runtime::new();
    assert!(UnsupportedOp::ALL.len() >= 40);
    for &op in UnsupportedOp::ALL {
        assert_eq!(rt.unsupported(op).map_err(ThreadError::errno), Err(ENOTSUP));
    }
}

#[test]
fn repeated_probing_is_idempotent() {
    let rt = Runtime::new();
    let m = rt.mutex_init(MutexKind::Recursive);
    rt.mutex_lock(m).unwrap();
    let key = rt.key_create(None).unwrap();
    rt.set_specific(key, 3).unwrap();
    let before = rt.metrics();

    let first: Vec<_> = UnsupportedOp::ALL.iter().map(|&op| rt.unsupported(op)).collect();
    let second: Vec<_> = UnsupportedOp::ALL.iter().map(|&op| rt.unsupported(op)).collect();
    assert_eq!(first, second);
    rt.testcancel();

    assert_eq!(rt.metrics(), before);
    assert_eq!(rt.get_specific(key), Ok(Some(3)));
    rt.mutex_unlock(m).unwrap();
    assert_eq!(rt.mutex_destroy(m), Ok(()));
}

#[test]
fn error_names_the_symbol() {
    let err = Runtime::new()
        .unsupported(UnsupportedOp::RwlockWrlock)
        .unwrap_err();
    assert_eq!(err.to_string(), "pthread_rwlock_wrlock is not supported");
}
