//! Serves the single fixed GATT service: one write characteristic for
//! commands, one notify characteristic for responses. Every byte that
//! arrives is handed straight to `faceaccess_protocol::Connection`; every
//! frame that comes back is written out, paced, and nothing else happens
//! here. Subscribing to the notify characteristic starts a new client
//! session (receiver state reset); unsubscribing or link loss ends it.

use crate::errors::TransportError;
use bluer::adv::Advertisement;
use bluer::gatt::local::{
    Application, Characteristic, CharacteristicNotify, CharacteristicNotifyMethod,
    CharacteristicWrite, CharacteristicWriteMethod, Service,
};
use bluer::Uuid;
use faceaccess_protocol::Connection;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

/// Minimum spacing between successive notify writes belonging to one
/// fragmented response, so BlueZ's internal queue never coalesces frames.
const FRAGMENT_PACING: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct BleEndpoints {
    pub device_name: String,
    pub service_uuid: Uuid,
    pub command_char_uuid: Uuid,
    pub response_char_uuid: Uuid,
}

impl BleEndpoints {
    pub fn parse(
        device_name: &str,
        service_uuid: &str,
        command_char_uuid: &str,
        response_char_uuid: &str,
    ) -> Result<Self, TransportError> {
        let parse_one = |s: &str| Uuid::from_str(s).map_err(|_| TransportError::InvalidUuid(s.to_string()));
        Ok(BleEndpoints {
            device_name: device_name.to_string(),
            service_uuid: parse_one(service_uuid)?,
            command_char_uuid: parse_one(command_char_uuid)?,
            response_char_uuid: parse_one(response_char_uuid)?,
        })
    }
}

/// Registers the advertisement and the GATT application, and serves them
/// until `shutdown` reports true. Both handles are dropped (deregistering
/// with BlueZ) when this future returns.
pub async fn serve(
    endpoints: BleEndpoints,
    connection: Arc<Mutex<Connection>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), TransportError> {
    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;
    tracing::info!(adapter = adapter.name(), "bluetooth adapter ready");

    let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(64);
    let outbound_rx = Arc::new(Mutex::new(outbound_rx));

    let write_connection = Arc::clone(&connection);
    let notify_connection = Arc::clone(&connection);

    let app = Application {
        services: vec![Service {
            uuid: endpoints.service_uuid,
            primary: true,
            characteristics: vec![
                Characteristic {
                    uuid: endpoints.command_char_uuid,
                    write: Some(CharacteristicWrite {
                        write: true,
                        write_without_response: true,
                        method: CharacteristicWriteMethod::Fun(Box::new(move |new_value, _req| {
                            let connection = Arc::clone(&write_connection);
                            let outbound_tx = outbound_tx.clone();
                            Box::pin(async move {
                                let frames = connection.lock().await.on_bytes_received(&new_value).await;
                                for frame in frames {
                                    if outbound_tx.send(frame).await.is_err() {
                                        break;
                                    }
                                    tokio::time::sleep(FRAGMENT_PACING).await;
                                }
                                Ok(())
                            })
                        })),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Characteristic {
                    uuid: endpoints.response_char_uuid,
                    notify: Some(CharacteristicNotify {
                        notify: true,
                        method: CharacteristicNotifyMethod::Fun(Box::new(move |mut notifier| {
                            let connection = Arc::clone(&notify_connection);
                            let outbound_rx = Arc::clone(&outbound_rx);
                            Box::pin(async move {
                                connection.lock().await.on_connect();
                                tracing::info!("ble client subscribed; receiver state reset");
                                let mut rx = outbound_rx.lock().await;
                                loop {
                                    match rx.recv().await {
                                        Some(frame) => {
                                            if notifier.notify(frame).await.is_err() {
                                                break;
                                            }
                                        }
                                        None => break,
                                    }
                                }
                                connection.lock().await.on_disconnect();
                                tracing::info!("ble client unsubscribed or link lost; receiver state reset");
                            })
                        })),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    let _app_handle = adapter.serve_gatt_application(app).await?;
    let _adv_handle = adapter
        .advertise(Advertisement {
            service_uuids: vec![endpoints.service_uuid].into_iter().collect(),
            local_name: Some(endpoints.device_name.clone()),
            discoverable: Some(true),
            ..Default::default()
        })
        .await?;

    tracing::info!(name = %endpoints.device_name, "advertising faceaccessd ble service");

    while !*shutdown.borrow() {
        shutdown.changed().await.ok();
    }

    tracing::info!("transport shutting down");
    Ok(())
}
