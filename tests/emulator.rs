use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::net::TcpListener;
use zoneflow::{
    DnsError, DnsManagementClient, Precondition, Workflow, ZoneApi,
    auth::{ClientSecretCredential, StaticTokenCredential, TokenCredential},
    config::{ClientConfig, WorkflowConfig},
    emulator::{ClientCredentials, EmulatorConfig, EmulatorState, create_router},
    model::{RecordPayload, RecordSet, RecordType, Tags, TxtRecord},
    pager::RecordSetPager,
    store::StoreOptions,
};

const TENANT: &str = "tenant-1";
const CLIENT_ID: &str = "client-1";
const SECRET: &str = "s3cret";
const STATIC_TOKEN: &str = "static-token";
const RG: &str = "rg";
const ZONE: &str = "contoso.com";

fn emulator_config() -> EmulatorConfig {
    EmulatorConfig {
        credentials: vec![ClientCredentials {
            tenant_id: TENANT.into(),
            client_id: CLIENT_ID.into(),
            client_secret: SECRET.into(),
        }],
        static_tokens: vec![STATIC_TOKEN.into()],
        store: StoreOptions::default(),
    }
}

async fn spawn_emulator(config: EmulatorConfig) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(EmulatorState::new(config));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client_with(base: &str, credential: Arc<dyn TokenCredential>) -> DnsManagementClient {
    let mut config = ClientConfig::new(base, "sub-1");
    config.poll_interval = std::time::Duration::from_millis(10);
    DnsManagementClient::new(config, credential).unwrap()
}

fn secret_client(base: &str, secret: &str) -> DnsManagementClient {
    let config = ClientConfig::new(base, "sub-1");
    let credential = ClientSecretCredential::new(
        reqwest::Client::new(),
        base,
        TENANT,
        CLIENT_ID,
        secret,
        config.token_scope(),
    );
    client_with(base, Arc::new(credential))
}

fn static_client(base: &str) -> DnsManagementClient {
    client_with(base, Arc::new(StaticTokenCredential::new(STATIC_TOKEN)))
}

#[tokio::test]
async fn test_standard_workflow_over_http() {
    let base = spawn_emulator(emulator_config()).await;
    let client = secret_client(&base, SECRET);

    let reports = Workflow::standard(WorkflowConfig::new(RG, ZONE))
        .run(&client)
        .await;
    let lines: Vec<String> = reports.iter().map(ToString::to_string).collect();

    assert_eq!(
        lines,
        vec![
            "Creating DNS zone 'contoso.com'...success",
            "Creating DNS 'A' record set with name 'www'...success",
            "Updating DNS 'A' record set with name 'www'...success",
            "Deleting DNS 'A' record set with name 'www'...success",
            "Creating DNS 'AAAA' record set with name 'aaaa-test'...success",
            "Creating DNS 'CNAME' record set with name 'cname-test'...success",
            "Creating DNS 'MX' record set with name 'mx-test'...success",
            "Creating DNS 'NS' record set with name 'ns-test'...success",
            "Creating DNS 'PTR' record set with name 'ptr-test'...success",
            "Creating DNS 'SRV' record set with name '_sip._tcp'...success",
            "Creating DNS 'TXT' record set with name 'txt-test'...success",
            "Counting record sets...success, 7 record sets found",
            "Counting NS record sets...success, 1 NS record sets found",
            "Deleting DNS zone 'contoso.com'...success",
        ]
    );

    let err = client.get_zone(RG, ZONE).await.unwrap_err();
    assert!(matches!(err, DnsError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn test_seeded_apex_is_counted() {
    let mut config = emulator_config();
    config.store = StoreOptions {
        apex_name_servers: vec!["ns1-01.example.net.".into(), "ns2-01.example.net.".into()],
        ..StoreOptions::default()
    };
    let base = spawn_emulator(config).await;
    let client = static_client(&base);

    let zone = client.create_zone(RG, ZONE, &Tags::new()).await.unwrap();
    assert_eq!(zone.name_servers.len(), 2);

    let mut pager = RecordSetPager::new(&client, RG, ZONE, Some(2), Some(RecordType::Ns));
    assert_eq!(pager.count().await.unwrap(), 1);

    // the apex SOA set comes back in the listing alongside NS
    let mut pager = RecordSetPager::new(&client, RG, ZONE, Some(1), None);
    let all = pager.collect_all().await.unwrap();
    let types: Vec<RecordType> = all.iter().map(RecordSet::record_type).collect();
    assert_eq!(types, vec![RecordType::Ns, RecordType::Soa]);

    let soa = client
        .get_record_set(RG, ZONE, "@", RecordType::Soa)
        .await
        .unwrap();
    match soa.payload {
        RecordPayload::Soa(record) => assert_eq!(record.host, "ns1-01.example.net."),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn test_authenticate_fails_fast_on_wrong_secret() {
    let base = spawn_emulator(emulator_config()).await;

    let err = secret_client(&base, "not-the-secret")
        .authenticate()
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::AuthenticationFailed(_)), "{err:?}");

    secret_client(&base, SECRET).authenticate().await.unwrap();
}

#[tokio::test]
async fn test_if_match_star_needs_existing_record_set() {
    let base = spawn_emulator(emulator_config()).await;
    let client = static_client(&base);
    client.create_zone(RG, ZONE, &Tags::new()).await.unwrap();

    let www = RecordSet::new("www", 3600, RecordPayload::A(vec![Ipv4Addr::new(1, 2, 3, 4)]));
    let err = client
        .upsert_record_set(RG, ZONE, &www, &Precondition::IfExists)
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::PreconditionFailed(_)), "{err:?}");
    let err = client
        .get_record_set(RG, ZONE, "www", RecordType::A)
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::NotFound(_)), "{err:?}");

    client
        .upsert_record_set(RG, ZONE, &www, &Precondition::None)
        .await
        .unwrap();
    let moved = RecordSet::new("www", 60, RecordPayload::A(vec![Ipv4Addr::new(5, 6, 7, 8)]));
    let saved = client
        .upsert_record_set(RG, ZONE, &moved, &Precondition::IfExists)
        .await
        .unwrap();
    assert_eq!(saved.ttl, 60);
    assert_eq!(saved.payload, moved.payload);
}

#[tokio::test]
async fn test_wrong_secret_is_authentication_failure() {
    let base = spawn_emulator(emulator_config()).await;
    let client = secret_client(&base, "not-the-secret");

    let err = client
        .create_zone(RG, ZONE, &Tags::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::AuthenticationFailed(_)), "{err:?}");
    assert_eq!(err.to_string(), "Invalid client secret provided.");
}

#[tokio::test]
async fn test_request_without_token_rejected() {
    let base = spawn_emulator(emulator_config()).await;
    let url = format!(
        "{base}/subscriptions/sub-1/resourceGroups/{RG}/providers/Microsoft.Network/dnsZones/{ZONE}?api-version=2018-05-01"
    );

    let res = reqwest::Client::new().get(&url).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "AuthenticationFailed");

    let res = reqwest::Client::new()
        .get(&url)
        .bearer_auth("forged")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_api_version_rejected() {
    let base = spawn_emulator(emulator_config()).await;
    let url = format!(
        "{base}/subscriptions/sub-1/resourceGroups/{RG}/providers/Microsoft.Network/dnsZones/{ZONE}"
    );
    let res = reqwest::Client::new()
        .get(&url)
        .bearer_auth(STATIC_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_existing_zone_reports_already_exists() {
    let base = spawn_emulator(emulator_config()).await;
    let client = static_client(&base);
    let tags = Tags::from([("dept".to_string(), "finance".to_string())]);

    client.create_zone(RG, ZONE, &tags).await.unwrap();
    let err = client
        .create_zone(RG, ZONE, &Tags::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::AlreadyExists(_)), "{err:?}");

    let zone = client.get_zone(RG, ZONE).await.unwrap();
    assert_eq!(zone.tags, tags);
}

#[tokio::test]
async fn test_optimistic_concurrency_over_http() {
    let base = spawn_emulator(emulator_config()).await;
    let client = static_client(&base);
    client.create_zone(RG, ZONE, &Tags::new()).await.unwrap();

    let www = RecordSet::new("www", 3600, RecordPayload::A(vec![Ipv4Addr::new(1, 2, 3, 4)]))
        .with_metadata("user", "Mary");
    client
        .upsert_record_set(RG, ZONE, &www, &Precondition::None)
        .await
        .unwrap();

    let mut read = client
        .get_record_set(RG, ZONE, "www", RecordType::A)
        .await
        .unwrap();
    assert_eq!(read.metadata.get("user").map(String::as_str), Some("Mary"));
    let token = read.etag.clone().unwrap();
    read.payload
        .append_distinct(RecordPayload::A(vec![Ipv4Addr::new(5, 6, 7, 8)]))
        .unwrap();

    let updated = client
        .upsert_record_set(RG, ZONE, &read, &Precondition::IfMatch(token.clone()))
        .await
        .unwrap();
    assert_ne!(updated.etag.as_ref(), Some(&token));
    assert_eq!(updated.payload.len(), 2);

    let err = client
        .upsert_record_set(RG, ZONE, &read, &Precondition::IfMatch(token))
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::PreconditionFailed(_)), "{err:?}");

    let err = client
        .upsert_record_set(RG, ZONE, &read, &Precondition::IfNoneMatch)
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::AlreadyExists(_)), "{err:?}");

    // unconditional writes and deletes ignore the token
    client
        .delete_record_set(RG, ZONE, "www", RecordType::A)
        .await
        .unwrap();
    client
        .delete_record_set(RG, ZONE, "www", RecordType::A)
        .await
        .unwrap();
    let err = client
        .get_record_set(RG, ZONE, "www", RecordType::A)
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn test_paging_follows_next_link() {
    let base = spawn_emulator(emulator_config()).await;
    let client = static_client(&base);
    client.create_zone(RG, ZONE, &Tags::new()).await.unwrap();
    for i in 0..5u8 {
        let set = RecordSet::new(
            format!("host{i}"),
            300,
            RecordPayload::A(vec![Ipv4Addr::new(10, 0, 0, i)]),
        );
        client
            .upsert_record_set(RG, ZONE, &set, &Precondition::None)
            .await
            .unwrap();
    }

    for page_size in [1, 2, 5, 10] {
        let mut pager = RecordSetPager::new(&client, RG, ZONE, Some(page_size), None);
        let all = pager.collect_all().await.unwrap();
        assert_eq!(all.len(), 5, "page size {page_size}");
        assert_eq!(
            pager.pages_fetched(),
            5usize.div_ceil(page_size as usize),
            "page size {page_size}"
        );
    }
}

#[tokio::test]
async fn test_txt_strings_round_trip() {
    let base = spawn_emulator(emulator_config()).await;
    let client = static_client(&base);
    client.create_zone(RG, ZONE, &Tags::new()).await.unwrap();

    let first = "x".repeat(66);
    let second = "y".repeat(67);
    let set = RecordSet::new(
        "txt-test",
        3600,
        RecordPayload::Txt(vec![TxtRecord::new([first.clone(), second.clone()])]),
    );
    client
        .upsert_record_set(RG, ZONE, &set, &Precondition::None)
        .await
        .unwrap();

    let read = client
        .get_record_set(RG, ZONE, "txt-test", RecordType::Txt)
        .await
        .unwrap();
    assert_eq!(
        read.payload,
        RecordPayload::Txt(vec![TxtRecord::new([first, second])])
    );
    assert_eq!(read.fqdn.as_deref(), Some("txt-test.contoso.com."));
}

#[tokio::test]
async fn test_zone_delete_cascades_over_http() {
    let base = spawn_emulator(emulator_config()).await;
    let client = static_client(&base);
    client.create_zone(RG, ZONE, &Tags::new()).await.unwrap();
    let ns = RecordSet::new("ns-test", 3600, RecordPayload::Ns(vec!["ns1.contoso.com".into()]));
    client
        .upsert_record_set(RG, ZONE, &ns, &Precondition::None)
        .await
        .unwrap();

    client.delete_zone(RG, ZONE).await.unwrap();
    client.delete_zone(RG, ZONE).await.unwrap();

    let err = client
        .get_record_set(RG, ZONE, "ns-test", RecordType::Ns)
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::NotFound(_)), "{err:?}");
}
