//! Unit tests for reconcile_helpers module

use super::*;
use crds::{BareMetalHostSpec, BmcDetails, HardwareDetails, Image};
use host_provisioner::{
    reason, FixtureFactory, NoUserData, ProvisionerFactory, RecordingPublisher,
    FIXTURE_PROVISIONING_ID,
};
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::Arc;

fn host(image: Option<&str>, online: bool) -> BareMetalHost {
    let mut host = BareMetalHost::new(
        "worker-0",
        BareMetalHostSpec {
            bmc: BmcDetails {
                address: "ipmi://192.168.1.10".to_string(),
                credentials_name: "worker-0-bmc".to_string(),
            },
            online,
            image: image.map(|url| Image {
                url: url.to_string(),
                checksum: String::new(),
            }),
            ..Default::default()
        },
    );
    host.metadata.namespace = Some("default".to_string());
    host
}

fn deleting_host() -> BareMetalHost {
    let mut host: BareMetalHost = serde_json::from_value(serde_json::json!({
        "apiVersion": "metal3.dcops.microscaler.io/v1alpha1",
        "kind": "BareMetalHost",
        "metadata": {
            "name": "worker-0",
            "namespace": "default",
            "deletionTimestamp": "2026-01-01T00:00:00Z",
            "finalizers": [FINALIZER]
        },
        "spec": {
            "bmc": {"address": "ipmi://192.168.1.10", "credentialsName": "worker-0-bmc"}
        }
    }))
    .unwrap();
    host.status_mut().provisioning.id = FIXTURE_PROVISIONING_ID.to_string();
    host
}

fn deleting_host_without_id() -> BareMetalHost {
    let mut host = deleting_host();
    host.status_mut().provisioning.id.clear();
    host
}

fn registered_and_inspected(image: Option<&str>, online: bool) -> BareMetalHost {
    let mut host = host(image, online);
    let status = host.status_mut();
    status.provisioning.id = FIXTURE_PROVISIONING_ID.to_string();
    status.hardware_details = Some(HardwareDetails::default());
    host
}

fn secret(pairs: &[(&str, &str)]) -> Secret {
    Secret {
        data: Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    }
}

#[test]
fn test_select_step_follows_phase() {
    let h = host(Some("http://images/os.qcow2"), false);
    assert_eq!(select_step(&h, HostPhase::Unregistered), Step::Register);
    assert_eq!(select_step(&h, HostPhase::Registered), Step::Register);
    assert_eq!(select_step(&h, HostPhase::Inspecting), Step::Inspect);
    assert_eq!(select_step(&h, HostPhase::Provisioning), Step::Provision);
    assert_eq!(select_step(&h, HostPhase::Deprovisioning), Step::Deprovision);
    assert_eq!(select_step(&h, HostPhase::Deprovisioned), Step::Deprovision);
}

#[test]
fn test_select_step_reconciles_power_when_settled() {
    let mut h = registered_and_inspected(None, true);
    assert_eq!(select_step(&h, HostPhase::Ready), Step::PowerOn);

    h.status_mut().powered_on = true;
    assert_eq!(select_step(&h, HostPhase::Ready), Step::UpdateHardwareState);

    h.spec.online = false;
    assert_eq!(select_step(&h, HostPhase::Provisioned), Step::PowerOff);

    // Lifecycle steps take precedence over power
    assert_eq!(select_step(&h, HostPhase::Inspecting), Step::Inspect);
}

#[tokio::test]
async fn test_run_step_dispatches_to_provisioner() {
    let publisher = RecordingPublisher::new();
    let mut h = host(Some("http://images/os.qcow2"), true);
    let factory = FixtureFactory::default();

    for step in [Step::Register, Step::Inspect, Step::Provision, Step::PowerOn] {
        let mut p = factory
            .new_provisioner(&mut h, Credentials::new("admin", "password"), Arc::new(publisher.clone()))
            .unwrap();
        let result = run_step(p.as_mut(), step, &NoUserData, false).await.unwrap();
        assert!(result.dirty, "{step} should change the host");
    }

    assert_eq!(
        publisher.reasons(),
        vec![
            reason::REGISTERED,
            reason::INSPECTION_COMPLETE,
            reason::PROVISIONING_COMPLETE,
            reason::POWER_ON,
        ]
    );
    assert_eq!(h.phase(), HostPhase::Provisioned);
}

#[test]
fn test_observed_phase_records_registered() {
    let mut h = host(None, false);
    h.status_mut().provisioning.id = FIXTURE_PROVISIONING_ID.to_string();

    assert_eq!(observed_phase(&h, Step::Register, &StepResult::dirty()), HostPhase::Registered);
    assert_eq!(observed_phase(&h, Step::Register, &StepResult::clean()), HostPhase::Inspecting);
    assert_eq!(observed_phase(&h, Step::Inspect, &StepResult::dirty()), HostPhase::Inspecting);
}

#[test]
fn test_observed_phase_waits_for_terminal_deprovision() {
    // ID just cleared: fields say Deprovisioned, the terminal call is still due
    let h = deleting_host_without_id();
    assert_eq!(h.phase(), HostPhase::Deprovisioned);
    assert_eq!(observed_phase(&h, Step::Deprovision, &StepResult::dirty()), HostPhase::Deprovisioning);
    assert_eq!(observed_phase(&h, Step::Deprovision, &StepResult::clean()), HostPhase::Deprovisioned);
}

#[test]
fn test_record_phase_only_reports_changes() {
    let mut h = host(None, false);
    assert!(!record_phase(&mut h, HostPhase::Unregistered));
    assert!(record_phase(&mut h, HostPhase::Registered));
    assert!(!record_phase(&mut h, HostPhase::Registered));
    assert_eq!(h.status.as_ref().unwrap().provisioning.state, HostPhase::Registered);
}

#[test]
fn test_teardown_complete_requires_clean_terminal_call() {
    let h = host(None, false);
    assert!(teardown_complete(&h, HostPhase::Deprovisioned, &StepResult::clean()));
    assert!(!teardown_complete(&h, HostPhase::Deprovisioned, &StepResult::dirty()));
    assert!(!teardown_complete(&h, HostPhase::Deprovisioning, &StepResult::clean()));

    let registered = registered_and_inspected(None, false);
    assert!(!teardown_complete(&registered, HostPhase::Deprovisioned, &StepResult::clean()));
}

#[test]
fn test_recycle_returns_host_to_unregistered() {
    let mut h = host(None, false);
    h.status_mut().provisioning.image = Image {
        url: "http://images/os.qcow2".to_string(),
        checksum: String::new(),
    };
    assert_eq!(h.phase(), HostPhase::Deprovisioned);

    assert!(recycle(&mut h));
    assert_eq!(h.phase(), HostPhase::Unregistered);
    assert!(!recycle(&mut h));
}

#[test]
fn test_status_patch_clears_hardware_details() {
    let mut h = registered_and_inspected(None, false);
    h.status_mut().hardware_details = None;

    let patch = create_host_status_patch(h.status.as_ref().unwrap()).unwrap();
    let status = &patch["status"];
    assert!(status["hardwareDetails"].is_null());
    assert!(status.as_object().unwrap().contains_key("hardwareDetails"));
    assert_eq!(status["provisioning"]["ID"], FIXTURE_PROVISIONING_ID);
    assert_eq!(status["operationalStatus"], "discovered");
}

#[test]
fn test_requeue_action() {
    assert_eq!(
        requeue_action(&StepResult::dirty().requeue(Duration::from_secs(10))),
        Action::requeue(Duration::from_secs(10))
    );
    assert_eq!(requeue_action(&StepResult::dirty()), Action::requeue(DIRTY_REQUEUE));
    assert_eq!(requeue_action(&StepResult::clean()), Action::requeue(RESYNC_INTERVAL));
}

#[test]
fn test_credentials_from_secret() {
    let credentials =
        credentials_from_secret(&secret(&[(USERNAME_KEY, "admin"), (PASSWORD_KEY, "password")])).unwrap();
    assert_eq!(credentials, Credentials::new("admin", "password"));
}

#[test]
fn test_credentials_from_string_data() {
    let secret = Secret {
        string_data: Some(BTreeMap::from([
            (USERNAME_KEY.to_string(), "admin".to_string()),
            (PASSWORD_KEY.to_string(), "password".to_string()),
        ])),
        ..Default::default()
    };
    assert!(credentials_from_secret(&secret).is_ok());
}

#[test]
fn test_credentials_missing_or_empty() {
    let missing = credentials_from_secret(&secret(&[(USERNAME_KEY, "admin")]));
    assert!(matches!(missing, Err(ControllerError::Credentials(_))));

    let empty = credentials_from_secret(&secret(&[(USERNAME_KEY, ""), (PASSWORD_KEY, "password")]));
    assert!(matches!(empty, Err(ControllerError::Credentials(_))));
}

#[test]
fn test_finalizer_patch_preserves_foreign_finalizers() {
    let mut h = host(None, false);
    assert!(!has_finalizer(&h));

    h.metadata.finalizers = Some(vec!["example.com/other".to_string()]);
    let added = finalizer_patch(&h, true);
    assert_eq!(
        added["metadata"]["finalizers"],
        serde_json::json!(["example.com/other", FINALIZER])
    );

    h.metadata.finalizers = Some(vec!["example.com/other".to_string(), FINALIZER.to_string()]);
    assert!(has_finalizer(&h));
    let removed = finalizer_patch(&h, false);
    assert_eq!(removed["metadata"]["finalizers"], serde_json::json!(["example.com/other"]));
}

#[test]
fn test_teardown_recorded_only_after_persisted_terminal_call() {
    let mut h = host(None, false);
    h.status_mut().provisioning.image = Image {
        url: "http://images/os.qcow2".to_string(),
        checksum: String::new(),
    };
    let phase = h.phase();
    assert_eq!(phase, HostPhase::Deprovisioned);
    assert!(!teardown_recorded(&h, phase));

    // What the reconciler persists after the terminal deprovision call
    let observed = observed_phase(&h, Step::Deprovision, &StepResult::clean());
    assert!(record_phase(&mut h, observed));
    assert!(teardown_recorded(&h, h.phase()));

    // Recycling moves the host on, so the terminal call is not repeated
    assert!(recycle(&mut h));
    assert!(!teardown_recorded(&h, h.phase()));
}

#[tokio::test]
async fn test_terminal_deprovision_runs_once_per_teardown() {
    let publisher = RecordingPublisher::new();
    let factory = FixtureFactory::default();
    let mut h = deleting_host();

    let mut ticks = 0;
    while !teardown_recorded(&h, h.phase()) {
        let phase = h.phase();
        let step = select_step(&h, phase);
        let result = {
            let mut p = factory
                .new_provisioner(&mut h, Credentials::default(), Arc::new(publisher.clone()))
                .unwrap();
            run_step(p.as_mut(), step, &NoUserData, true).await.unwrap()
        };
        let observed = observed_phase(&h, step, &result);
        record_phase(&mut h, observed);
        ticks += 1;
        assert!(ticks < 5, "teardown did not settle");
    }

    assert_eq!(publisher.count(reason::DEPROVISION_COMPLETE), 1);
    assert!(release_without_teardown(&h));
}

#[test]
fn test_release_without_teardown_only_for_deleting_hosts() {
    assert!(release_without_teardown(&deleting_host()));

    let mut released = deleting_host();
    released.metadata.finalizers = None;
    assert!(!release_without_teardown(&released));

    let mut live = host(None, false);
    live.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
    assert!(!release_without_teardown(&live));
}
