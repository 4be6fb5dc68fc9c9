use std::error::Error;

use crate::cli::decode::decode_packet;

#[test]
fn test_decode_packet() -> Result<(), Box<dyn Error + Send + Sync>> {
    // A and LB pressed, left stick pushed right
    let report = decode_packet("00 00 00 11 00 00 ff 7f")?.ok_or("no report")?;
    assert!(report.a);
    assert!(report.lb);
    assert!(!report.b);
    assert_eq!(report.left_x, 32767);
    assert_eq!(report.left_y, 0);

    Ok(())
}

#[test]
fn test_decode_packet_other_report() -> Result<(), Box<dyn Error + Send + Sync>> {
    assert!(decode_packet("01 03 00")?.is_none());

    Ok(())
}

#[test]
fn test_decode_packet_invalid() -> Result<(), Box<dyn Error + Send + Sync>> {
    assert!(decode_packet("not hex").is_err());
    assert!(decode_packet("").is_err());
    assert!(decode_packet(&"00".repeat(33)).is_err());

    Ok(())
}
