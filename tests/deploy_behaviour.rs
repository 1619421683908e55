//! End-to-end deployment scenarios against an in-memory host.
//!
//! Each scenario drives the public request boundary and inspects the host
//! calls and streamed bytes recorded by `RecordingHost`.

use hotdeploy::test_support::{HostCall, RecordingHost, archive_bytes, streamed_archive_bytes};
use hotdeploy::{
    InstallCoordinator, InstallOutcome, InstallRequest, ModuleHandle, ModuleId, UploadPart,
    handle_request,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::fs;
use std::io::{Cursor, Read};
use std::sync::Arc;
use tempfile::TempDir;
use zip::ZipArchive;

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

// ----- World types -----

#[derive(Default)]
struct DeployWorld {
    host: Option<Arc<RecordingHost>>,
    coordinator: Option<InstallCoordinator>,
    module_dir: Option<TempDir>,
    upload: Option<Vec<u8>>,
    outcomes: Vec<InstallOutcome>,
}

#[fixture]
fn world() -> DeployWorld {
    DeployWorld::default()
}

impl DeployWorld {
    fn use_host(&mut self, host: RecordingHost) {
        let host = Arc::new(host);
        self.coordinator = Some(InstallCoordinator::new(host.clone()));
        self.host = Some(host);
    }

    fn host(&self) -> &RecordingHost {
        self.host.as_deref().expect("module host set")
    }

    fn handle(&mut self, request: InstallRequest<'_>) {
        let coordinator = self.coordinator.as_ref().expect("module host set");
        let outcome = handle_request(coordinator, request);
        self.outcomes.push(outcome);
    }

    fn deploy_dir(&mut self, refresh: bool) {
        let dir = self
            .module_dir
            .as_ref()
            .expect("module directory set")
            .path()
            .display()
            .to_string();
        self.handle(InstallRequest {
            dir: Some(dir),
            refresh_packages: refresh,
            parts: None,
        });
    }

    fn send_upload(&mut self, bytes: Vec<u8>) {
        let coordinator = self.coordinator.as_ref().expect("module host set");
        let outcome = handle_request(
            coordinator,
            InstallRequest {
                parts: Some(vec![UploadPart::named("module.jar", bytes.as_slice())]),
                ..InstallRequest::default()
            },
        );
        self.outcomes.push(outcome);
        self.upload = Some(bytes);
    }

    fn last(&self) -> &InstallOutcome {
        self.outcomes.last().expect("a request was handled")
    }

    fn first_payload(&self) -> Vec<u8> {
        self.host()
            .payloads()
            .into_iter()
            .next()
            .expect("an archive was streamed")
    }
}

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    (0..archive.len())
        .map(|i| archive.by_index(i).expect("entry").name().to_owned())
        .collect()
}

fn filler_manifest(name: &str) -> String {
    format!("Bundle-SymbolicName: {name}\r\n\r\n")
}

// Step definitions

#[given("an empty module host")]
fn given_empty_host(world: &mut DeployWorld) {
    world.use_host(RecordingHost::new());
}

#[given("a module host already running the system module")]
fn given_host_with_system_module(world: &mut DeployWorld) {
    world.use_host(RecordingHost::with_modules(vec![ModuleHandle::new(
        ModuleId::new(0),
        Some("system.bundle".to_owned()),
        "System Bundle",
    )]));
}

#[given("a module host that rejects with \"{reason}\"")]
fn given_rejecting_host(world: &mut DeployWorld, reason: String) {
    world.use_host(RecordingHost::new().rejecting(reason));
}

/// Lays out `name` with 4 files across 3 subdirectories.
#[given("an exploded module \"{name}\"")]
fn given_exploded_module(world: &mut DeployWorld, name: String) {
    let root = TempDir::new().expect("temp dir");
    let manifest = format!("Bundle-SymbolicName: {name}\nBundle-Version: 1.0.0\n");
    let files = [
        (MANIFEST_PATH, manifest.as_str()),
        ("plugin.properties", "name=foo"),
        ("org/example/Foo.class", "foo"),
        ("org/example/Bar.class", "bar"),
        ("OSGI-INF/component.xml", "<component/>"),
    ];
    for (relative, content) in files {
        let path = root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write file");
    }
    world.module_dir = Some(root);
}

#[given("an archive of \"{name}\" with {size} bytes of filler")]
fn given_archive_with_filler(world: &mut DeployWorld, name: String, size: usize) {
    let filler = "z".repeat(size);
    world.upload = Some(archive_bytes(
        &filler_manifest(&name),
        &[("big.bin", filler.as_str())],
    ));
}

#[given("a streamed archive of \"{name}\" with {size} bytes of filler")]
fn given_streamed_archive_with_filler(world: &mut DeployWorld, name: String, size: usize) {
    let filler = vec![b'z'; size];
    world.upload = Some(streamed_archive_bytes(
        &filler_manifest(&name),
        &[("big.bin", filler.as_slice())],
    ));
}

#[when("the directory is deployed")]
fn when_dir_deployed(world: &mut DeployWorld) {
    world.deploy_dir(false);
}

#[when("the directory is deployed with refresh")]
fn when_dir_deployed_with_refresh(world: &mut DeployWorld) {
    world.deploy_dir(true);
}

#[when("an archive of \"{name}\" version \"{version}\" is uploaded")]
fn when_versioned_archive_uploaded(world: &mut DeployWorld, name: String, version: String) {
    let bytes = archive_bytes(
        &format!("Bundle-SymbolicName: {name}\r\nBundle-Version: {version}\r\n\r\n"),
        &[("org/example/Foo.class", "foo v2")],
    );
    world.send_upload(bytes);
}

#[when("the archive is uploaded")]
fn when_archive_uploaded(world: &mut DeployWorld) {
    let bytes = world.upload.take().expect("archive prepared");
    world.send_upload(bytes);
}

#[when("an empty request is handled")]
fn when_empty_request(world: &mut DeployWorld) {
    world.handle(InstallRequest::default());
}

#[then("the deploy succeeds")]
fn then_deploy_succeeds(world: &mut DeployWorld) {
    let outcome = world.last();
    assert!(outcome.success, "deploy failed: {:?}", outcome.message);
}

#[then("the streamed archive starts with the manifest")]
fn then_manifest_first(world: &mut DeployWorld) {
    let names = entry_names(&world.first_payload());
    assert_eq!(names.first().map(String::as_str), Some(MANIFEST_PATH));
    assert_eq!(names.iter().filter(|n| *n == MANIFEST_PATH).count(), 1);
}

#[then("the streamed archive holds {count} entries")]
fn then_entry_count(world: &mut DeployWorld, count: usize) {
    // manifest + 4 files + META-INF/, org/, org/example/, OSGI-INF/
    assert_eq!(entry_names(&world.first_payload()).len(), count);
}

#[then("the new module was installed then started then refreshed")]
fn then_install_start_refresh(world: &mut DeployWorld) {
    let handle = world.last().handle.clone().expect("installed module");
    let calls = world.host().calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(calls[0], HostCall::Install { .. }));
    assert_eq!(calls[1], HostCall::Start { id: handle.id() });
    assert_eq!(
        calls[2],
        HostCall::Refresh {
            ids: vec![handle.id()]
        }
    );
}

#[then("the upload updated the first module")]
fn then_upload_updated(world: &mut DeployWorld) {
    let installed = world.outcomes[0]
        .handle
        .clone()
        .expect("first deploy installed");
    assert_eq!(
        world.last().handle.as_ref().map(ModuleHandle::id),
        Some(installed.id())
    );
    assert_eq!(
        world.host().calls().last(),
        Some(&HostCall::Update { id: installed.id() })
    );
    assert_eq!(world.host().payloads().last(), world.upload.as_ref());
}

#[then("the host saw {count} install")]
fn then_install_count(world: &mut DeployWorld, count: usize) {
    let installs = world
        .host()
        .calls()
        .iter()
        .filter(|c| matches!(c, HostCall::Install { .. }))
        .count();
    assert_eq!(installs, count);
}

#[then("the host received the uploaded bytes unchanged")]
fn then_bytes_unchanged(world: &mut DeployWorld) {
    let sent = world.upload.clone().expect("archive uploaded");
    assert_eq!(world.host().payloads(), vec![sent]);
}

#[then("the host installed from \"{location}\"")]
fn then_install_location(world: &mut DeployWorld, location: String) {
    assert_eq!(
        world.host().calls().first(),
        Some(&HostCall::Install { location })
    );
}

#[then("the response status is {status}")]
fn then_status(world: &mut DeployWorld, status: u16) {
    assert_eq!(world.last().status(), status);
}

#[then("the response body reports a failure with a message")]
fn then_failure_body(world: &mut DeployWorld) {
    let body = world.last().result().to_json().expect("serialise");
    let parsed: serde_json::Value = serde_json::from_str(&body).expect("json body");
    assert_eq!(parsed["success"], serde_json::Value::Bool(false));
    assert!(parsed["message"].is_string());
}

#[then("the host was not called")]
fn then_host_untouched(world: &mut DeployWorld) {
    assert!(world.host().calls().is_empty());
}

#[then("the failure message mentions \"{text}\"")]
fn then_failure_mentions(world: &mut DeployWorld, text: String) {
    let outcome = world.last();
    assert!(!outcome.success);
    let message = outcome.message.as_deref().expect("failure message");
    assert!(message.contains(&text), "{message:?} lacks {text:?}");
}

#[then("the streamed manifest names \"{name}\" with CRLF line endings")]
fn then_manifest_rewritten(world: &mut DeployWorld, name: String) {
    let payload = world.first_payload();
    let mut archive = ZipArchive::new(Cursor::new(payload.as_slice())).expect("valid zip");
    let mut manifest = String::new();
    archive
        .by_name(MANIFEST_PATH)
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    assert!(manifest.contains(&format!("Bundle-SymbolicName: {name}\r\n")));
    assert!(manifest.ends_with("\r\n\r\n"));
}

// Scenario bindings

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Directory install streams a manifest-first archive"
)]
fn scenario_manifest_first_archive(world: DeployWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Fresh directory install with refresh"
)]
fn scenario_fresh_install_with_refresh(world: DeployWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Second deploy of the same name is an update"
)]
fn scenario_second_deploy_updates(world: DeployWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Uploaded bytes reach the host unchanged"
)]
fn scenario_upload_unchanged(world: DeployWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Streamed jar larger than the inspection window"
)]
fn scenario_streamed_jar(world: DeployWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Request without a source renders a failure body"
)]
fn scenario_failure_body(world: DeployWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Host rejection surfaces as a failed outcome"
)]
fn scenario_host_rejection(world: DeployWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Directory manifest is rewritten with CRLF line endings"
)]
fn scenario_manifest_rewritten(world: DeployWorld) {
    let _ = world;
}
