//! SoftAP register transport.
//!
//! Advertising means the access point is up. A client joins the network and
//! talks to the register table over HTTP:
//!
//! - `GET /api/registers/<name>` reads a register
//! - `POST /api/registers/<name>` with `{"value":N}` writes one
//!
//! HTTP handlers run on the server's own task. Each request is queued for
//! the Wireless Interface and the handler waits for the answer, so requests
//! are served strictly one at a time. Client join/leave events update
//! [`LinkStatus`] directly from the system event loop.

use crate::config::AccessPointConfig;
use crate::status::LinkStatus;
use crate::traits::{RegisterOp, RegisterReply, WirelessTransport};
use crate::wireless::codec::{decode_write, encode_reply, status_code, REPLY_CAPACITY};
use crate::wireless::Field;
use esp_idf_hal::io::Write;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::http::server::{
    Configuration as HttpConfiguration, EspHttpConnection, EspHttpServer, Request,
};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::EspIOError;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration, EspWifi, WifiEvent,
};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::time::Duration;

const REGISTER_PATH: &str = "/api/registers/";
const MAX_BODY: usize = 64;

/// How long a handler waits for the Wireless Interface.
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

struct PendingRequest {
    op: RegisterOp,
    reply: SyncSender<RegisterReply>,
}

/// SoftAP + HTTP implementation of [`WirelessTransport`].
pub struct Esp32SoftApTransport {
    wifi: BlockingWifi<EspWifi<'static>>,
    _server: EspHttpServer<'static>,
    _events: EspSubscription<'static, System>,
    requests: Receiver<PendingRequest>,
    in_flight: Option<SyncSender<RegisterReply>>,
}

impl Esp32SoftApTransport {
    /// Configures the access point and the HTTP server. The radio stays off
    /// until [`start_advertising`](WirelessTransport::start_advertising).
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        config: &AccessPointConfig,
        link: Arc<LinkStatus>,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop.clone())?;

        let mut ssid: heapless::String<32> = heapless::String::new();
        let _ = ssid.push_str(config.ssid.as_str());
        let mut password: heapless::String<64> = heapless::String::new();
        let _ = password.push_str(config.password.as_str());

        wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
            ssid,
            password,
            channel: config.channel,
            auth_method: if config.has_password() {
                AuthMethod::WPA2Personal
            } else {
                AuthMethod::None
            },
            max_connections: 1,
            ..Default::default()
        }))?;

        let events = sysloop.subscribe::<WifiEvent, _>(move |event| match event {
            WifiEvent::ApStaConnected { .. } => link.set_connected(true),
            WifiEvent::ApStaDisconnected { .. } => link.set_connected(false),
            _ => {}
        })?;

        let (tx, requests) = mpsc::channel::<PendingRequest>();
        let server = register_server(config.port, tx)?;
        log::info!(
            "SoftAP '{}' configured, registers on port {}",
            config.ssid,
            config.port
        );

        Ok(Self {
            wifi,
            _server: server,
            _events: events,
            requests,
            in_flight: None,
        })
    }
}

fn register_server(port: u16, requests: Sender<PendingRequest>) -> anyhow::Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&HttpConfiguration {
        http_port: port,
        uri_match_wildcard: true,
        ..Default::default()
    })?;

    let for_read = requests.clone();
    server.fn_handler(
        "/api/registers/*",
        Method::Get,
        move |req| -> Result<(), EspIOError> {
            let reply = match field_from_uri(req.uri()) {
                Some(field) => submit(&for_read, RegisterOp::Read(field)),
                None => None,
            };
            write_reply(req, reply)
        },
    )?;

    let for_write = requests;
    server.fn_handler(
        "/api/registers/*",
        Method::Post,
        move |mut req| -> Result<(), EspIOError> {
            let Some(field) = field_from_uri(req.uri()) else {
                return write_reply(req, None);
            };
            let mut body = [0u8; MAX_BODY];
            let len = req.read(&mut body).unwrap_or(0);
            let reply = match decode_write(field, &body[..len]) {
                Ok(value) => submit(&for_write, RegisterOp::Write(field, value)),
                Err(err) => Some(RegisterReply::Rejected(field, err)),
            };
            write_reply(req, reply)
        },
    )?;

    Ok(server)
}

fn field_from_uri(uri: &str) -> Option<Field> {
    let name = uri.strip_prefix(REGISTER_PATH)?;
    let name = name.split('?').next().unwrap_or(name);
    Field::from_name(name)
}

fn submit(requests: &Sender<PendingRequest>, op: RegisterOp) -> Option<RegisterReply> {
    let (reply, answer) = mpsc::sync_channel(1);
    requests.send(PendingRequest { op, reply }).ok()?;
    match answer.recv_timeout(REPLY_TIMEOUT) {
        Ok(reply) => Some(reply),
        Err(_) => {
            log::warn!("No answer for {:?}", op);
            None
        }
    }
}

fn write_reply(
    req: Request<&mut EspHttpConnection<'_>>,
    reply: Option<RegisterReply>,
) -> Result<(), EspIOError> {
    const JSON: &[(&str, &str)] = &[("Content-Type", "application/json")];
    let Some(reply) = reply else {
        let mut resp = req.into_response(404, None, JSON)?;
        resp.write_all(b"{\"error\":\"unavailable\"}")?;
        return Ok(());
    };

    let mut buf = [0u8; REPLY_CAPACITY];
    let len = encode_reply(&reply, &mut buf).unwrap_or(0);
    let mut resp = req.into_response(status_code(&reply), None, JSON)?;
    resp.write_all(&buf[..len])?;
    Ok(())
}

impl WirelessTransport for Esp32SoftApTransport {
    type Error = anyhow::Error;

    fn start_advertising(&mut self) -> anyhow::Result<()> {
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        log::info!("SoftAP up");
        Ok(())
    }

    fn stop_advertising(&mut self) -> anyhow::Result<()> {
        if self.wifi.is_started()? {
            self.wifi.stop()?;
        }
        log::info!("SoftAP down");
        Ok(())
    }

    fn poll_request(&mut self) -> Option<RegisterOp> {
        if self.in_flight.is_some() {
            return None;
        }
        let PendingRequest { op, reply } = self.requests.try_recv().ok()?;
        self.in_flight = Some(reply);
        Some(op)
    }

    fn respond(&mut self, reply: RegisterReply) {
        match self.in_flight.take() {
            // a timed-out handler has gone; nothing to do
            Some(tx) => {
                let _ = tx.try_send(reply);
            }
            None => log::warn!("Reply without a request: {:?}", reply),
        }
    }
}
