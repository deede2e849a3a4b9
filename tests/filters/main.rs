use std::{sync::Arc, time::Duration};

use desire_arbiter::filters::{
    FilterCall, FilterDescriptor, FilterErrorKind, FilterManager, InMemoryFilterServices,
};

fn manager(wait: Duration) -> (FilterManager, Arc<InMemoryFilterServices>) {
    let services = Arc::new(InMemoryFilterServices::new());
    (FilterManager::new(services.clone(), wait), services)
}

#[tokio::test]
async fn given_late_divider_service_when_registering_generic_divider_then_wait_succeeds() {
    let (manager, services) = manager(Duration::from_secs(2));

    let advertiser = {
        let services = Arc::clone(&services);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            services.advertise("/lidar/set_divider_rate").await;
        })
    };

    let descriptor = manager
        .register_filter("lidar", "GenericDivider")
        .await
        .expect("divider should register once the service appears");
    advertiser.await.expect("advertiser should finish");

    assert_eq!(descriptor.filter_type, "GenericDivider");
    assert_eq!(descriptor.name, "lidar");
}

#[tokio::test]
async fn given_missing_divider_service_when_wait_expires_then_registration_fails() {
    let (manager, _) = manager(Duration::from_millis(20));

    let err = manager
        .register_filter("lidar", "GenericDivider")
        .await
        .expect_err("absent service should fail registration");

    assert_eq!(err.kind, FilterErrorKind::ServicesMissing);
    assert!(manager.get_filters().await.is_empty());
}

#[tokio::test]
async fn given_registered_filters_when_listing_then_names_types_and_states_are_reported() {
    let (manager, services) = manager(Duration::from_millis(20));
    for service in [
        "/camera/switch_set_state",
        "/camera/set_divider_rate",
        "/lidar/set_divider_rate",
    ] {
        services.advertise(service).await;
    }
    manager
        .register_filter("lidar", "GenericDivider")
        .await
        .expect("divider should register");
    manager
        .register_filter("camera", "switch_filter")
        .await
        .expect("switch should register");

    manager
        .set_state("camera", true)
        .await
        .expect("switch state should apply");
    manager
        .set_divider_rate("camera", 5)
        .await
        .expect("switch divider should apply");
    manager
        .set_divider_rate("lidar", 2)
        .await
        .expect("divider rate should apply");

    assert_eq!(
        manager.get_filters().await,
        vec![
            FilterDescriptor {
                name: "camera".to_string(),
                filter_type: "switch_filter".to_string(),
                state: "5".to_string(),
            },
            FilterDescriptor {
                name: "lidar".to_string(),
                filter_type: "GenericDivider".to_string(),
                state: "2".to_string(),
            },
        ]
    );
    assert_eq!(
        services.calls().await,
        vec![
            (
                "/camera/switch_set_state".to_string(),
                FilterCall::SetState { state: true }
            ),
            (
                "/camera/set_divider_rate".to_string(),
                FilterCall::SetDividerRate { divider: 5 }
            ),
            (
                "/lidar/set_divider_rate".to_string(),
                FilterCall::SetDividerRate { divider: 2 }
            ),
        ]
    );
}

#[tokio::test]
async fn given_existing_namespace_when_registering_again_then_filter_is_overwritten() {
    let (manager, services) = manager(Duration::from_millis(20));
    for service in ["/camera/switch_set_state", "/camera/set_divider_rate"] {
        services.advertise(service).await;
    }
    manager
        .register_filter("camera", "switch_filter")
        .await
        .expect("switch should register");
    manager
        .set_state("camera", false)
        .await
        .expect("switch state should apply");

    manager
        .register_filter("camera", "GenericDivider")
        .await
        .expect("divider should replace the switch");

    let filters = manager.get_filters().await;
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].filter_type, "GenericDivider");
    assert_eq!(filters[0].state, "");
}

#[tokio::test]
async fn given_unregistered_namespace_when_setting_state_then_not_found() {
    let (manager, _) = manager(Duration::from_millis(20));

    let err = manager
        .set_divider_rate("ghost", 1)
        .await
        .expect_err("unknown namespace should fail");

    assert_eq!(err.kind, FilterErrorKind::NotFound);
}
