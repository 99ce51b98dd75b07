use std::collections::BTreeMap;

use indoc::indoc;
use rstest::rstest;

use super::*;
use crate::{
    crd::{GameDefinition, value::AnyValue},
    testing::{InMemoryStore, Operation, RecordingEventSink},
};

const NAMESPACE: &str = "games";

fn game_definition() -> GameDefinition {
    serde_yaml::from_str(indoc! {r#"
        apiVersion: kraftnetes.com/v1alpha1
        kind: GameDefinition
        metadata:
          name: minecraft
        spec:
          game: minecraft
          image: itzg/minecraft-server:latest
          filebrowser: "&{filebrowser}"
          storage:
            enabled: true
            defaultSize: 5Gi
          ports:
            - name: game
              containerPort: 25565
              type: HostPort
          env:
            - name: GAME_VERSION
              value: "&{version}"
          inputs:
            version:
              required: true
            filebrowser:
              type: boolean
              default: true
    "#})
    .unwrap()
}

fn game_server() -> GameServer {
    let mut game_server: GameServer = serde_yaml::from_str(indoc! {r#"
        apiVersion: kraftnetes.com/v1alpha1
        kind: GameServer
        metadata:
          name: survival
          namespace: games
          uid: 0b5e7f2c-2f4b-4d4c-9d43-1f0c1a2b3c4d
        spec:
          game: minecraft
    "#})
    .unwrap();
    game_server
        .spec
        .inputs
        .insert("version".to_owned(), AnyValue::from("1.20"));
    game_server
}

fn ctx(store: InMemoryStore) -> Arc<Ctx<InMemoryStore, RecordingEventSink>> {
    Arc::new(Ctx {
        store,
        events: RecordingEventSink::default(),
        config: OperatorConfig::default(),
    })
}

fn created(names: &[(&str, &str)]) -> Vec<(String, String)> {
    names
        .iter()
        .map(|(kind, name)| ((*kind).to_owned(), (*name).to_owned()))
        .collect()
}

#[tokio::test]
async fn creates_all_children_and_marks_running() {
    let ctx = ctx(InMemoryStore::default().with_game_definition(game_definition()));

    let action = reconcile(Arc::new(game_server()), ctx.clone())
        .await
        .unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(
        ctx.store.created(),
        created(&[
            ("Service", "gs-survival-service"),
            ("Service", "gs-survival-filebrowser-service"),
            ("PersistentVolumeClaim", "gs-survival-pvc"),
            ("Pod", "gs-survival-pod"),
        ])
    );
    assert_eq!(
        ctx.store.status_patches(),
        vec![
            GameServerStatus::new(GameServerState::Pending, PENDING_MESSAGE),
            GameServerStatus::new(GameServerState::Running, RUNNING_MESSAGE),
        ]
    );
    assert_eq!(
        ctx.events.reasons(),
        vec![
            "Initializing",
            "ServiceCreated",
            "FilebrowserServiceCreated",
            "PvcCreated",
            "PodCreated",
            "StatusUpdated",
        ]
    );

    let pod: Pod = ctx.store.object("gs-survival-pod", NAMESPACE).unwrap();
    let container = &pod.spec.unwrap().containers[0];
    let env = container.env.as_ref().unwrap();
    assert_eq!(env[0].name, "GAME_VERSION");
    assert_eq!(env[0].value.as_deref(), Some("1.20"));
    assert_eq!(
        pod.metadata.owner_references.unwrap()[0].name,
        "survival"
    );
}

#[tokio::test]
async fn second_pass_changes_nothing() {
    let ctx = ctx(InMemoryStore::default().with_game_definition(game_definition()));
    reconcile(Arc::new(game_server()), ctx.clone())
        .await
        .unwrap();
    let pod_before: Pod = ctx.store.object("gs-survival-pod", NAMESPACE).unwrap();
    let reconciled: GameServer = ctx.store.object("survival", NAMESPACE).unwrap();

    let action = reconcile(Arc::new(reconciled), ctx.clone()).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(ctx.store.created().len(), 4);
    assert_eq!(ctx.store.status_patches().len(), 2);
    assert_eq!(ctx.events.events().len(), 6);
    let pod_after: Pod = ctx.store.object("gs-survival-pod", NAMESPACE).unwrap();
    assert_eq!(pod_before, pod_after);
}

#[tokio::test]
async fn missing_game_definition_requeues() {
    let ctx = ctx(InMemoryStore::default());

    let action = reconcile(Arc::new(game_server()), ctx.clone())
        .await
        .unwrap();

    assert_eq!(action, Action::requeue(ctx.config.requeue_after));
    assert!(ctx.store.created().is_empty());
    assert_eq!(
        ctx.store.status_patches(),
        vec![GameServerStatus::new(
            GameServerState::Pending,
            PENDING_MESSAGE
        )]
    );
    assert_eq!(
        ctx.events.events(),
        vec![
            GameServerEvent::Initializing,
            GameServerEvent::GameDefinitionNotFound {
                game: "minecraft".to_owned()
            },
        ]
    );
}

#[tokio::test]
async fn unresolved_inputs_fail_without_children() {
    let ctx = ctx(InMemoryStore::default().with_game_definition(game_definition()));
    let mut game_server = game_server();
    game_server.spec.inputs.clear();

    let err = reconcile(Arc::new(game_server), ctx.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ResolveInputs { .. }), "{err:?}");
    assert_eq!(err.category(), "ResolveInputs");
    assert!(ctx.store.created().is_empty());
    assert_eq!(ctx.store.status_patches().len(), 1);
}

#[tokio::test]
async fn unknown_profile_fails() {
    let ctx = ctx(InMemoryStore::default().with_game_definition(game_definition()));
    let mut game_server = game_server();
    game_server.spec.profile = Some("hardcore".to_owned());

    let err = reconcile(Arc::new(game_server), ctx.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ApplyProfile { .. }), "{err:?}");
    assert!(ctx.store.created().is_empty());
}

#[rstest]
#[case::service_lookup(Operation::Get, "Service", "EnsureService", &[])]
#[case::pvc_creation(
    Operation::Create,
    "PersistentVolumeClaim",
    "EnsureVolumeClaim",
    &[("Service", "gs-survival-service"), ("Service", "gs-survival-filebrowser-service")]
)]
#[case::pod_creation(
    Operation::Create,
    "Pod",
    "EnsurePod",
    &[
        ("Service", "gs-survival-service"),
        ("Service", "gs-survival-filebrowser-service"),
        ("PersistentVolumeClaim", "gs-survival-pvc"),
    ]
)]
#[tokio::test]
async fn failing_step_stops_the_pass(
    #[case] operation: Operation,
    #[case] kind: &str,
    #[case] category: &str,
    #[case] expected_created: &[(&str, &str)],
) {
    let ctx = ctx(InMemoryStore::default().with_game_definition(game_definition()));
    ctx.store.fail(operation, kind);

    let err = reconcile(Arc::new(game_server()), ctx.clone())
        .await
        .unwrap_err();

    assert_eq!(err.category(), category);
    assert_eq!(ctx.store.created(), created(expected_created));
    assert_eq!(
        ctx.store.status_patches(),
        vec![GameServerStatus::new(
            GameServerState::Pending,
            PENDING_MESSAGE
        )]
    );
    assert!(!ctx.events.reasons().contains(&"StatusUpdated"));
}

#[tokio::test]
async fn failing_pod_creation_names_the_pod() {
    let ctx = ctx(InMemoryStore::default().with_game_definition(game_definition()));
    ctx.store.fail(Operation::Create, "Pod");

    let err = reconcile(Arc::new(game_server()), ctx.clone())
        .await
        .unwrap_err();

    let secondary = err.secondary_object().unwrap();
    assert_eq!(secondary.name, "gs-survival-pod");
    assert_eq!(secondary.namespace.as_deref(), Some(NAMESPACE));
}

#[tokio::test]
async fn retry_after_failure_completes_the_pass() {
    let store = InMemoryStore::default().with_game_definition(game_definition());
    let ctx = ctx(store);
    ctx.store.fail(Operation::Create, "Pod");
    reconcile(Arc::new(game_server()), ctx.clone())
        .await
        .unwrap_err();

    let retry_ctx = Arc::new(Ctx {
        store: InMemoryStore::default().with_game_definition(game_definition()),
        events: RecordingEventSink::default(),
        config: OperatorConfig::default(),
    });
    // Children left behind by the failed pass are picked up as they are.
    for (kind, name) in ctx.store.created() {
        match kind.as_str() {
            "Service" => retry_ctx
                .store
                .insert(&ctx.store.object::<Service>(&name, NAMESPACE).unwrap()),
            "PersistentVolumeClaim" => retry_ctx.store.insert(
                &ctx.store
                    .object::<PersistentVolumeClaim>(&name, NAMESPACE)
                    .unwrap(),
            ),
            _ => unreachable!("unexpected {kind}"),
        }
    }
    let pending: GameServer = ctx.store.object("survival", NAMESPACE).unwrap();

    reconcile(Arc::new(pending), retry_ctx.clone())
        .await
        .unwrap();

    assert_eq!(
        retry_ctx.store.created(),
        created(&[("Pod", "gs-survival-pod")])
    );
    assert_eq!(retry_ctx.events.reasons(), vec!["PodCreated", "StatusUpdated"]);
}

#[tokio::test]
async fn optional_children_are_skipped() {
    let mut definition = game_definition();
    definition.spec.ports.clear();
    definition.spec.storage = None;
    let ctx = ctx(InMemoryStore::default().with_game_definition(definition));
    let mut game_server = game_server();
    game_server.spec.file_browser = Some(false);

    reconcile(Arc::new(game_server), ctx.clone())
        .await
        .unwrap();

    assert_eq!(ctx.store.created(), created(&[("Pod", "gs-survival-pod")]));
}

#[tokio::test]
async fn instance_id_label_names_the_children() {
    let ctx = ctx(InMemoryStore::default().with_game_definition(game_definition()));
    let mut game_server = game_server();
    game_server.metadata.labels = Some(BTreeMap::from([(
        crate::names::INSTANCE_ID_LABEL.to_owned(),
        "a1b2c3".to_owned(),
    )]));

    reconcile(Arc::new(game_server), ctx.clone())
        .await
        .unwrap();

    assert_eq!(
        ctx.store.created(),
        created(&[
            ("Service", "gs-a1b2c3-service"),
            ("Service", "gs-a1b2c3-filebrowser-service"),
            ("PersistentVolumeClaim", "gs-a1b2c3-pvc"),
            ("Pod", "gs-a1b2c3-pod"),
        ])
    );
}

#[tokio::test]
async fn running_game_server_without_changes_is_not_patched() {
    let ctx = ctx(InMemoryStore::default().with_game_definition(game_definition()));
    let mut game_server = game_server();
    game_server.status = Some(GameServerStatus::new(
        GameServerState::Running,
        RUNNING_MESSAGE,
    ));

    reconcile(Arc::new(game_server), ctx.clone())
        .await
        .unwrap();

    assert!(ctx.store.status_patches().is_empty());
    assert!(!ctx.events.reasons().contains(&"Initializing"));
}

#[tokio::test]
async fn status_patch_failure_is_reported() {
    let ctx = ctx(InMemoryStore::default().with_game_definition(game_definition()));
    ctx.store.fail(Operation::PatchStatus, "GameServer");

    let err = reconcile(Arc::new(game_server()), ctx.clone())
        .await
        .unwrap_err();

    assert_eq!(err.category(), "InitializeStatus");
    assert!(ctx.store.created().is_empty());
}

#[test]
fn errors_are_requeued() {
    let ctx = ctx(InMemoryStore::default());
    let action = error_policy(
        Arc::new(game_server()),
        &Error::ObjectHasNoNamespace,
        ctx.clone(),
    );
    assert_eq!(action, Action::requeue(ctx.config.requeue_after));
}
