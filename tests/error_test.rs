//! Error messages and classification.

use quota_ledger::core::{
    Dimension, QuotaClass, QuotaError, QuotaErrorKind, ServiceRef, StoreError,
};

#[test]
fn test_messages_carry_class_prefix() {
    let shortage = QuotaError::Shortage {
        class: QuotaClass::Private,
        dimension: Dimension::RamGib,
        requested: 8,
        available: 2,
    };
    assert_eq!(
        shortage.to_string(),
        "service private quota, ram quota shortage (requested 8, available 2)"
    );

    let shrink = QuotaError::OnlyIncrease {
        class: QuotaClass::Share,
        dimension: Dimension::PublicIp,
        current: 4,
        requested: 1,
    };
    assert_eq!(
        shrink.to_string(),
        "service share quota, public ip quota may only be increased (current 4, requested 1)"
    );

    let missing = QuotaError::RecordUnavailable {
        class: QuotaClass::Share,
        service: ServiceRef::new("svc-9"),
    };
    assert_eq!(
        missing.to_string(),
        "service share quota, failed to create quota record for service svc-9"
    );
}

#[test]
fn test_kind_and_dimension() {
    let invalid = QuotaError::InvalidAmount {
        dimension: Dimension::DiskSize,
        amount: -1,
    };
    assert_eq!(invalid.kind(), QuotaErrorKind::Quota);
    assert_eq!(invalid.dimension(), Some(Dimension::DiskSize));

    let store: QuotaError = StoreError::Backend("disk full".into()).into();
    assert_eq!(store.kind(), QuotaErrorKind::Quota);
    assert_eq!(store.dimension(), None);
    assert!(store.to_string().contains("disk full"));

    let shortage = QuotaError::Shortage {
        class: QuotaClass::Share,
        dimension: Dimension::Vcpu,
        requested: 1,
        available: 0,
    };
    assert_eq!(shortage.kind(), QuotaErrorKind::Shortage);
    assert_eq!(shortage.dimension(), Some(Dimension::Vcpu));

    let shrink = QuotaError::OnlyIncrease {
        class: QuotaClass::Private,
        dimension: Dimension::PrivateIp,
        current: 3,
        requested: 2,
    };
    assert_eq!(shrink.kind(), QuotaErrorKind::OnlyIncrease);
}

#[test]
fn test_errors_convert_into_anyhow() {
    fn fails() -> quota_ledger::core::AppResult<()> {
        Err(QuotaError::InvalidAmount {
            dimension: Dimension::Vcpu,
            amount: -3,
        })?;
        Ok(())
    }
    let err = fails().unwrap_err();
    assert!(err.downcast_ref::<QuotaError>().is_some());
}
