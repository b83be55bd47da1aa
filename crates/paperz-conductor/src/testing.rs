//! In-process conductor double.
//!
//! Serves the real wire protocol over real websockets, backed by in-memory
//! tables. Sense-maker expressions are never evaluated here: outputs are
//! whatever a test seeded, and `set_sm_*` stores the source with a unit
//! output. Step calls are recorded for assertions rather than applied.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use paperz_core::config::ConductorConfig;
use paperz_core::hash::{ActionHash, AgentPubKey, CellId, DnaHash, EntryHash};
use paperz_core::sensemaker::{AGENT_PATH, ANNOTATIONZ_PATH, MEMEZ_PATH, SensemakerEntry, SmValue};
use paperz_core::types::{Annotation, Meme, Paper};

use crate::wire::{
    AdminRequest, AdminResponse, AppRequest, AppResponse, InstalledApp, InstalledCell, Payload,
    RemoteError, WireKind, WireMessage, ZomeCall,
};

/// One recorded step call, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub path: String,
    pub target: StepTarget,
    pub act: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTarget {
    Entry(EntryHash),
    /// Base64-rendered key appended to the path zome-side.
    PathComponent(String),
}

#[derive(Default)]
struct StubState {
    counter: u64,
    cells: Vec<CellId>,
    installed: HashMap<String, InstalledApp>,
    active_apps: Vec<String>,
    registered_dnas: Vec<DnaHash>,
    papers: Vec<(EntryHash, Paper)>,
    annotations: Vec<(EntryHash, Annotation)>,
    memez: Vec<(EntryHash, Meme)>,
    sm_init: HashMap<String, (EntryHash, SensemakerEntry)>,
    sm_comp: HashMap<String, (EntryHash, SensemakerEntry)>,
    sm_data: HashMap<(String, EntryHash), (EntryHash, SensemakerEntry)>,
    steps: Vec<StepRecord>,
    agent_inits: Vec<(String, String)>,
    hub_cell: Option<CellId>,
    fail_next_zome_call: Option<String>,
}

impl StubState {
    fn next_raw(&mut self, tag: u8) -> Vec<u8> {
        self.counter += 1;
        let mut bytes = vec![tag];
        bytes.extend_from_slice(&self.counter.to_le_bytes());
        bytes
    }

    fn next_entry_hash(&mut self) -> EntryHash {
        EntryHash::from_raw(self.next_raw(0x30))
    }

    fn next_action_hash(&mut self) -> ActionHash {
        ActionHash::from_raw(self.next_raw(0x40))
    }

    fn set_sm_entry(&mut self, kind: SmKind, path: String, expr: String, value: SmValue) {
        let eh = self.next_entry_hash();
        let entry = SensemakerEntry {
            expr_str: expr,
            output_flat_value: value,
        };
        let map = match kind {
            SmKind::Init => &mut self.sm_init,
            SmKind::Comp => &mut self.sm_comp,
        };
        map.insert(path, (eh, entry));
    }
}

#[derive(Clone, Copy)]
enum SmKind {
    Init,
    Comp,
}

/// Aborts an accept loop when the stub drops.
struct ServeTask(JoinHandle<()>);

impl Drop for ServeTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A scripted conductor on two ephemeral localhost ports.
pub struct StubConductor {
    state: Arc<Mutex<StubState>>,
    admin_addr: SocketAddr,
    app_addr: SocketAddr,
    _admin_task: ServeTask,
    _app_task: ServeTask,
}

#[derive(Clone, Copy)]
enum Interface {
    Admin,
    App,
}

impl StubConductor {
    /// Bind both interfaces and serve until dropped.
    pub async fn start() -> Self {
        let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let app_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let admin_addr = admin_listener.local_addr().unwrap();
        let app_addr = app_listener.local_addr().unwrap();

        let state = Arc::new(Mutex::new(StubState::default()));
        let admin_task = tokio::spawn(serve(admin_listener, Arc::clone(&state), Interface::Admin));
        let app_task = tokio::spawn(serve(app_listener, Arc::clone(&state), Interface::App));

        Self {
            state,
            admin_addr,
            app_addr,
            _admin_task: ServeTask(admin_task),
            _app_task: ServeTask(app_task),
        }
    }

    pub fn admin_url(&self) -> String {
        format!("ws://{}", self.admin_addr)
    }

    pub fn app_url(&self) -> String {
        format!("ws://{}", self.app_addr)
    }

    /// A config whose ports point at this stub.
    pub fn config(&self) -> ConductorConfig {
        ConductorConfig {
            app_port: self.app_addr.port(),
            admin_port: self.admin_addr.port(),
            ..ConductorConfig::default()
        }
    }

    // ── Seeding ──

    /// Install an app with one cell and mark it active, as a provisioned
    /// conductor would have it.
    pub fn install_paperz_app(&self, app_id: &str) -> CellId {
        let mut st = self.state.lock().unwrap();
        let dna = DnaHash::from_raw(st.next_raw(0x10));
        let agent = AgentPubKey::from_raw(st.next_raw(0x20));
        let cell = CellId::new(dna, agent);
        st.cells.push(cell.clone());
        st.installed.insert(
            app_id.to_string(),
            InstalledApp {
                installed_app_id: app_id.to_string(),
                cell_data: vec![InstalledCell {
                    cell_id: cell.clone(),
                    role_id: "thedna".into(),
                }],
            },
        );
        st.active_apps.push(app_id.to_string());
        cell
    }

    /// A bare cell not tied to any installed app.
    pub fn add_cell(&self) -> CellId {
        let mut st = self.state.lock().unwrap();
        let dna = DnaHash::from_raw(st.next_raw(0x10));
        let agent = AgentPubKey::from_raw(st.next_raw(0x20));
        let cell = CellId::new(dna, agent);
        st.cells.push(cell.clone());
        cell
    }

    pub fn seed_paper(&self, paper: Paper) -> EntryHash {
        let mut st = self.state.lock().unwrap();
        let eh = st.next_entry_hash();
        st.papers.push((eh.clone(), paper));
        eh
    }

    pub fn seed_annotation(&self, annotation: Annotation) -> EntryHash {
        let mut st = self.state.lock().unwrap();
        let eh = st.next_entry_hash();
        st.annotations.push((eh.clone(), annotation));
        eh
    }

    pub fn seed_meme(&self, meme: Meme) -> EntryHash {
        let mut st = self.state.lock().unwrap();
        let eh = st.next_entry_hash();
        st.memez.push((eh.clone(), meme));
        eh
    }

    pub fn seed_sm_init(&self, path: &str, expr: &str, value: SmValue) {
        let mut st = self.state.lock().unwrap();
        st.set_sm_entry(SmKind::Init, path.into(), expr.into(), value);
    }

    pub fn seed_sm_comp(&self, path: &str, expr: &str, value: SmValue) {
        let mut st = self.state.lock().unwrap();
        st.set_sm_entry(SmKind::Comp, path.into(), expr.into(), value);
    }

    pub fn seed_sm_data(&self, path: &str, target: &EntryHash, expr: &str, value: SmValue) {
        let mut st = self.state.lock().unwrap();
        let eh = st.next_entry_hash();
        let entry = SensemakerEntry {
            expr_str: expr.into(),
            output_flat_value: value,
        };
        st.sm_data
            .insert((path.to_string(), target.clone()), (eh, entry));
    }

    /// Make the next zome call fail with the given message.
    pub fn fail_next_zome_call(&self, message: &str) {
        self.state.lock().unwrap().fail_next_zome_call = Some(message.to_string());
    }

    // ── Assertions ──

    pub fn papers(&self) -> Vec<(EntryHash, Paper)> {
        self.state.lock().unwrap().papers.clone()
    }

    pub fn annotations(&self) -> Vec<(EntryHash, Annotation)> {
        self.state.lock().unwrap().annotations.clone()
    }

    pub fn memez(&self) -> Vec<(EntryHash, Meme)> {
        self.state.lock().unwrap().memez.clone()
    }

    pub fn registered_dnas(&self) -> Vec<DnaHash> {
        self.state.lock().unwrap().registered_dnas.clone()
    }

    pub fn active_apps(&self) -> Vec<String> {
        self.state.lock().unwrap().active_apps.clone()
    }

    pub fn steps(&self) -> Vec<StepRecord> {
        self.state.lock().unwrap().steps.clone()
    }

    pub fn agent_inits(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().agent_inits.clone()
    }

    pub fn hub_cell(&self) -> Option<CellId> {
        self.state.lock().unwrap().hub_cell.clone()
    }
}

async fn serve(listener: TcpListener, state: Arc<Mutex<StubState>>, iface: Interface) {
    loop {
        let Ok((tcp, _)) = listener.accept().await else {
            return;
        };
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
                return;
            };
            let (mut sink, mut stream) = ws.split();
            while let Some(Ok(msg)) = stream.next().await {
                let Message::Binary(bytes) = msg else {
                    continue;
                };
                let Ok(envelope) = WireMessage::decode(&bytes) else {
                    continue;
                };
                if envelope.kind != WireKind::Request {
                    continue;
                }
                let reply = match iface {
                    Interface::Admin => handle_admin(&state, &envelope.data),
                    Interface::App => handle_app(&state, &envelope.data),
                };
                let frame = WireMessage::response(envelope.id, reply).encode().unwrap();
                if sink.send(Message::Binary(frame)).await.is_err() {
                    return;
                }
            }
        });
    }
}

fn handle_admin(state: &Mutex<StubState>, data: &Payload) -> Payload {
    let resp = match data.decode::<AdminRequest>() {
        Err(err) => AdminResponse::Error(RemoteError {
            kind: "deserialization".into(),
            message: err.to_string(),
        }),
        Ok(req) => {
            let mut st = state.lock().unwrap();
            admin_response(&mut st, req)
        }
    };
    Payload::encode(&resp).unwrap()
}

fn admin_response(st: &mut StubState, req: AdminRequest) -> AdminResponse {
    match req {
        AdminRequest::RegisterDna { path: _ } => {
            let hash = DnaHash::from_raw(st.next_raw(0x10));
            st.registered_dnas.push(hash.clone());
            AdminResponse::DnaRegistered(hash)
        }
        AdminRequest::InstallApp {
            installed_app_id,
            agent_key,
            dnas,
        } => {
            let cell_data: Vec<InstalledCell> = dnas
                .into_iter()
                .map(|spec| InstalledCell {
                    cell_id: CellId::new(spec.hash, agent_key.clone()),
                    role_id: spec.role_id,
                })
                .collect();
            for cell in &cell_data {
                st.cells.push(cell.cell_id.clone());
            }
            let app = InstalledApp {
                installed_app_id: installed_app_id.clone(),
                cell_data,
            };
            st.installed.insert(installed_app_id, app.clone());
            AdminResponse::AppInstalled(app)
        }
        AdminRequest::EnableApp { installed_app_id } => {
            if !st.installed.contains_key(&installed_app_id) {
                return AdminResponse::Error(RemoteError {
                    kind: "app_not_installed".into(),
                    message: installed_app_id,
                });
            }
            if !st.active_apps.contains(&installed_app_id) {
                st.active_apps.push(installed_app_id);
            }
            AdminResponse::AppEnabled
        }
        AdminRequest::DisableApp { installed_app_id } => {
            st.active_apps.retain(|id| id != &installed_app_id);
            AdminResponse::AppDisabled
        }
        AdminRequest::UninstallApp { installed_app_id } => {
            if let Some(app) = st.installed.remove(&installed_app_id) {
                for cell in &app.cell_data {
                    st.cells.retain(|c| c != &cell.cell_id);
                }
            }
            st.active_apps.retain(|id| id != &installed_app_id);
            AdminResponse::AppUninstalled
        }
        AdminRequest::GenerateAgentPubKey => {
            AdminResponse::AgentPubKeyGenerated(AgentPubKey::from_raw(st.next_raw(0x20)))
        }
        AdminRequest::ListDnas => AdminResponse::DnasListed(st.registered_dnas.clone()),
        AdminRequest::ListCellIds => AdminResponse::CellIdsListed(st.cells.clone()),
        AdminRequest::ListActiveApps => AdminResponse::ActiveAppsListed(st.active_apps.clone()),
        AdminRequest::AttachAppInterface { port } => AdminResponse::AppInterfaceAttached { port },
    }
}

fn handle_app(state: &Mutex<StubState>, data: &Payload) -> Payload {
    let resp = match data.decode::<AppRequest>() {
        Err(err) => AppResponse::Error(RemoteError {
            kind: "deserialization".into(),
            message: err.to_string(),
        }),
        Ok(AppRequest::AppInfo { installed_app_id }) => {
            let st = state.lock().unwrap();
            AppResponse::AppInfo(st.installed.get(&installed_app_id).cloned())
        }
        Ok(AppRequest::CallZome(call)) => {
            let mut st = state.lock().unwrap();
            dispatch_zome(&mut st, &call)
        }
    };
    Payload::encode(&resp).unwrap()
}

fn zome_ok<T: Serialize>(value: &T) -> AppResponse {
    AppResponse::ZomeCalled(Payload::encode(value).unwrap())
}

fn zome_err(kind: &str, message: impl Into<String>) -> AppResponse {
    AppResponse::Error(RemoteError {
        kind: kind.into(),
        message: message.into(),
    })
}

fn with_input<T, F>(call: &ZomeCall, f: F) -> AppResponse
where
    T: DeserializeOwned,
    F: FnOnce(T) -> AppResponse,
{
    match call.payload.decode::<T>() {
        Ok(input) => f(input),
        Err(err) => zome_err("deserialization", err.to_string()),
    }
}

fn dispatch_zome(st: &mut StubState, call: &ZomeCall) -> AppResponse {
    if let Some(message) = st.fail_next_zome_call.take() {
        return zome_err("internal_error", message);
    }

    match call.fn_name.as_str() {
        "get_all_paperz" => zome_ok(&st.papers),

        "get_annotations_for_paper" => with_input(call, |paper_eh: EntryHash| {
            let anns: Vec<(EntryHash, Annotation)> = st
                .annotations
                .iter()
                .filter(|(_, ann)| ann.paper_ref == paper_eh)
                .cloned()
                .collect();
            zome_ok(&anns)
        }),

        "upload_paper" => with_input(call, |(paper, agent): (Paper, AgentPubKey)| {
            let eh = st.next_entry_hash();
            let hh = st.next_action_hash();
            st.papers.push((eh.clone(), paper));
            // the zome bumps the uploader's per-agent machine
            st.steps.push(StepRecord {
                path: AGENT_PATH.into(),
                target: StepTarget::PathComponent(agent.to_base64()),
                act: "1".into(),
            });
            zome_ok(&(eh, hh))
        }),

        "create_annotation" => with_input(call, |annotation: Annotation| {
            let eh = st.next_entry_hash();
            let hh = st.next_action_hash();
            st.annotations.push((eh.clone(), annotation));
            // sm_data starts as a copy of the current sm_init
            if let Some((_, init)) = st.sm_init.get(ANNOTATIONZ_PATH).cloned() {
                let data_eh = st.next_entry_hash();
                st.sm_data
                    .insert((ANNOTATIONZ_PATH.into(), eh.clone()), (data_eh, init));
            }
            zome_ok(&(eh, hh))
        }),

        "get_sm_data" => with_input(call, |target_eh: EntryHash| {
            // data hangs off the entry itself, whichever path seeded it
            let data = st
                .sm_data
                .iter()
                .find(|((_, eh), _)| *eh == target_eh)
                .map(|(_, entry)| entry.clone());
            zome_ok(&data)
        }),

        "get_sm_init" => with_input(call, |path: String| zome_ok(&st.sm_init.get(&path).cloned())),

        "get_sm_comp" => with_input(call, |path: String| zome_ok(&st.sm_comp.get(&path).cloned())),

        "set_sm_init" => with_input(call, |(path, expr): (String, String)| {
            st.set_sm_entry(SmKind::Init, path, expr, SmValue::Unit);
            zome_ok(&true)
        }),

        "set_sm_comp" => with_input(call, |(path, expr): (String, String)| {
            st.set_sm_entry(SmKind::Comp, path, expr, SmValue::Unit);
            zome_ok(&true)
        }),

        "init_agent_sm_data" => with_input(call, |(path, agent_b64): (String, String)| {
            st.agent_inits.push((path, agent_b64));
            zome_ok(&())
        }),

        "step_sm_remote" => with_input(call, |(path, eh, act): (String, EntryHash, String)| {
            st.steps.push(StepRecord {
                path,
                target: StepTarget::Entry(eh),
                act,
            });
            zome_ok(&())
        }),

        "step_sm_path_remote" => {
            with_input(call, |(path, component, act): (String, String, String)| {
                st.steps.push(StepRecord {
                    path,
                    target: StepTarget::PathComponent(component),
                    act,
                });
                zome_ok(&())
            })
        }

        "set_sensemaker_cell_id" => with_input(call, |cell: CellId| {
            st.hub_cell = Some(cell);
            zome_ok(&())
        }),

        "get_sensemaker_cell_id" => zome_ok(&st.hub_cell),

        "upload_meme" => with_input(call, |meme: Meme| {
            let eh = st.next_entry_hash();
            let hh = st.next_action_hash();
            st.memez.push((eh.clone(), meme));
            // sm_data starts as a copy of the current sm_init
            if let Some((_, init)) = st.sm_init.get(MEMEZ_PATH).cloned() {
                let data_eh = st.next_entry_hash();
                st.sm_data
                    .insert((MEMEZ_PATH.into(), eh.clone()), (data_eh, init));
            }
            zome_ok(&(eh, hh))
        }),

        "clap_for_meme" => with_input(call, |meme_eh: EntryHash| {
            st.steps.push(StepRecord {
                path: MEMEZ_PATH.into(),
                target: StepTarget::Entry(meme_eh),
                act: "1".into(),
            });
            zome_ok(&())
        }),

        "meme_clap_count" => with_input(call, |meme_eh: EntryHash| {
            let count = st
                .sm_data
                .get(&(MEMEZ_PATH.into(), meme_eh))
                .and_then(|(_, entry)| entry.output_flat_value.as_int());
            zome_ok(&count)
        }),

        "get_all_memez" => with_input(call, |(_comp, _agent): (String, AgentPubKey)| {
            let feed: Vec<(EntryHash, Meme, i64)> = st
                .memez
                .iter()
                .map(|(eh, meme)| {
                    let score = st
                        .sm_data
                        .get(&(MEMEZ_PATH.into(), eh.clone()))
                        .and_then(|(_, entry)| entry.output_flat_value.as_int())
                        .unwrap_or(0);
                    (eh.clone(), meme.clone(), score)
                })
                .collect();
            zome_ok(&feed)
        }),

        other => zome_err("unknown_function", other),
    }
}
