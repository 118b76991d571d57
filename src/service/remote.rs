//! Registration service client
//!
//! Talks JSON to the OLT registration service, which owns the telnet
//! sessions to the Huawei chassis.

use crate::config::Config;
use crate::error::ServiceError;
use crate::http::HttpClient;
use crate::models::{
    OltId, OltRef, ProfileId, RegisterRequest, RegisterResponse, RegistrationEntry, RegistrationProfile,
    ScanResponse,
};
use crate::service::ProvisioningService;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct DiscoveryRequest<'a> {
    olt_id: &'a OltId,
}

/// HTTP back end for the registration service
pub struct RemoteService {
    name: String,
    client: HttpClient,
}

impl RemoteService {
    pub fn new(cfg: &Config) -> Result<Self, ServiceError> {
        Ok(Self {
            name: format!("remote ({})", cfg.service.base_url),
            client: HttpClient::new(&cfg.service.base_url, cfg.bearer_token(), &cfg.http)?,
        })
    }
}

#[async_trait]
impl ProvisioningService for RemoteService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_olts(&self) -> Result<Vec<OltRef>, ServiceError> {
        self.client.get_json("olts").await
    }

    async fn list_profiles(&self) -> Result<Vec<RegistrationProfile>, ServiceError> {
        self.client.get_json("profiles").await
    }

    async fn scan_devices(&self, olt: &OltId) -> Result<ScanResponse, ServiceError> {
        tracing::info!("[{}] Running autofind on OLT {}...", self.name, olt);
        self.client
            .post_json("discovery/scan", &DiscoveryRequest { olt_id: olt })
            .await
    }

    async fn scan_devices_simulated(&self, olt: &OltId) -> Result<ScanResponse, ServiceError> {
        tracing::info!("[{}] Requesting simulated autofind for OLT {}...", self.name, olt);
        self.client
            .post_json("discovery/demo-scan", &DiscoveryRequest { olt_id: olt })
            .await
    }

    async fn register_devices(
        &self,
        olt: &OltId,
        profile: &ProfileId,
        entries: &[RegistrationEntry],
    ) -> Result<RegisterResponse, ServiceError> {
        tracing::info!(
            "[{}] Registering {} ONT(s) on OLT {} with profile {}...",
            self.name,
            entries.len(),
            olt,
            profile
        );
        let request = RegisterRequest {
            olt_id: olt,
            profile_id: profile,
            ont_entries: entries,
        };
        self.client.post_json("register", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, RemoteService) {
        let server = MockServer::start().await;
        let mut cfg = Config::default();
        cfg.service.backend = Backend::Remote;
        cfg.service.base_url = server.uri();
        cfg.http.max_retries = 1;
        let service = RemoteService::new(&cfg).unwrap();
        (server, service)
    }

    #[tokio::test]
    async fn test_list_directory() {
        let (server, service) = setup().await;

        Mock::given(method("GET"))
            .and(path("/api/olts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": "65a1", "name": "OLT Pusat", "ip_address": "10.10.0.2",
                "port": 23, "username": "root", "password": "****", "status": "connected"
            }])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/profiles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "p1", "name": "VLAN40", "olt_id": "65a1", "line_profile_id": 15, "srv_profile_id": 15},
                {"id": "p2", "name": "Other", "olt_id": "77b2", "line_profile_id": 1, "srv_profile_id": 1},
                {"id": "p3", "name": "Generic", "line_profile_id": 2, "srv_profile_id": 2}
            ])))
            .mount(&server)
            .await;

        let olts = service.list_olts().await.unwrap();
        assert_eq!(olts[0].id, OltId::new("65a1"));
        assert_eq!(olts[0].status.as_deref(), Some("connected"));

        let names: Vec<String> = service
            .profiles_for(&OltId::new("65a1"))
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["VLAN40", "Generic"]);
    }

    #[tokio::test]
    async fn test_scan() {
        let (server, service) = setup().await;

        Mock::given(method("POST"))
            .and(path("/api/discovery/scan"))
            .and(body_json(json!({"olt_id": "65a1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "count": 1,
                "onts": [{"number": 1, "fsp": "0/1/7", "frame": 0, "slot": 1, "port": 7,
                          "sn": "414C434CB443689D", "sn_friendly": "ALCL-B443689D",
                          "vendor_id": "ALCL", "equipment_id": "G-140W-MD"}],
                "scanned_at": "2024-01-15T03:30:25+00:00"
            })))
            .mount(&server)
            .await;

        let scan = service.scan_devices(&OltId::new("65a1")).await.unwrap();
        assert_eq!(scan.count, 1);
        assert_eq!(scan.onts[0].fsp, "0/1/7");
        assert_eq!(scan.onts[0].equipment_id.as_deref(), Some("G-140W-MD"));
    }

    #[tokio::test]
    async fn test_scan_failure_is_an_error() {
        let (server, service) = setup().await;

        Mock::given(method("POST"))
            .and(path("/api/discovery/scan"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "Gagal koneksi ke OLT"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = service.scan_devices(&OltId::new("65a1")).await;
        assert!(matches!(result, Err(ServiceError::Api { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_register() {
        let (server, service) = setup().await;
        let entries = vec![RegistrationEntry {
            sn: "414C434CB443689D".into(),
            fsp: "0/1/7".into(),
            description: "G-140W-MD".into(),
        }];

        Mock::given(method("POST"))
            .and(path("/api/register"))
            .and(body_json(json!({
                "olt_id": "65a1",
                "profile_id": "p1",
                "ont_entries": [{"sn": "414C434CB443689D", "fsp": "0/1/7", "description": "G-140W-MD"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "total": 1, "success_count": 1, "fail_count": 0,
                "results": [{"sn": "414C434CB443689D", "fsp": "0/1/7", "description": "G-140W-MD",
                             "success": true, "ont_id": 2, "service_port_id": 3,
                             "commands": ["ont add 7 2 sn-auth \"414C434CB443689D\" omci ont-lineprofile-id 15 ont-srvprofile-id 15"],
                             "output": ["..."], "error": null}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = service
            .register_devices(&OltId::new("65a1"), &ProfileId::new("p1"), &entries)
            .await
            .unwrap();
        assert_eq!(resp.success_count, 1);
        assert_eq!(resp.results[0].service_port_id(), Some(3));
    }
}
