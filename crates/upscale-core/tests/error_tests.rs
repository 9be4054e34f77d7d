use upscale_core::UpscaleError;

#[test]
fn converts_io_error() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let error: UpscaleError = io_error.into();

    match error {
        UpscaleError::Io(err) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn converts_anyhow_error() {
    let error: UpscaleError = anyhow::anyhow!("boom").into();

    match error {
        UpscaleError::Other(err) => assert_eq!(err.to_string(), "boom"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn attaches_context() {
    let error = UpscaleError::Source("truncated frame".to_string()).with_context("reading frame 9");

    assert_eq!(
        error.to_string(),
        "reading frame 9: source error: truncated frame"
    );
    match error {
        UpscaleError::Context { context, source } => {
            assert_eq!(context, "reading frame 9");
            assert!(matches!(*source, UpscaleError::Source(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn ordering_errors_name_both_sequence_numbers() {
    let violation = UpscaleError::OrderViolation {
        last: 7,
        attempted: 4,
    };
    assert_eq!(
        violation.to_string(),
        "sink order violation (last delivered 7, attempted 4)"
    );
    assert_eq!(
        UpscaleError::DuplicateSequence(3).to_string(),
        "duplicate sequence number 3 in reassembly buffer"
    );
}
