use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use inventory::models::{NewUser, Role};
use inventory::{AppState, Config, Database, seed};
use tower::ServiceExt;

/// Drives the router like a browser: keeps the session cookie between
/// requests and reads CSRF tokens out of rendered forms.
struct TestClient {
    app: Router,
    cookie: Option<String>,
}

impl TestClient {
    fn new(state: &AppState) -> Self {
        Self {
            app: inventory::app(state.clone()),
            cookie: None,
        }
    }

    async fn send(&mut self, request: Request<Body>) -> Response<Body> {
        let response = self.app.clone().oneshot(request).await.unwrap();

        if let Some(value) = response.headers().get(header::SET_COOKIE) {
            let cookie = value.to_str().unwrap();
            let pair = cookie.split(';').next().unwrap().to_string();
            self.cookie = Some(pair);
        }
        response
    }

    async fn get(&mut self, uri: &str) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
        let body = serde_urlencoded::to_string(fields).unwrap();
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    async fn get_text(&mut self, uri: &str) -> String {
        let response = self.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        body_text(response).await
    }

    /// CSRF token from a page that renders a form
    async fn csrf(&mut self, uri: &str) -> String {
        let html = self.get_text(uri).await;
        let marker = "name=\"csrf_token\" value=\"";
        let start = html.find(marker).expect("page has no csrf field") + marker.len();
        let end = start + html[start..].find('"').unwrap();
        html[start..end].to_string()
    }

    async fn login(&mut self, email: &str, password: &str) -> Response<Body> {
        let token = self.csrf("/login").await;
        self.post(
            "/login",
            &[("email", email), ("password", password), ("csrf_token", &token)],
        )
        .await
    }
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

async fn setup() -> AppState {
    let config = Config::default();
    let state = AppState::new(Database::in_memory().await.unwrap(), &config);
    seed::ensure_admin(&state, &config).await.unwrap();
    state
        .users
        .create(&NewUser {
            name: "Usuário Comum".into(),
            email: "usuario@estoque.com".into(),
            password: "user123".into(),
            role: Role::Regular,
        })
        .await
        .unwrap();
    state
}

async fn admin_client(state: &AppState) -> TestClient {
    let mut client = TestClient::new(state);
    let response = client.login("admin@estoque.com", "admin123").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    client
}

async fn create_product(client: &mut TestClient, code: &str, min_stock: &str) -> Response<Body> {
    let token = client.csrf("/produto/novo").await;
    client
        .post(
            "/produto/novo",
            &[
                ("code", code),
                ("name", "Notebook Dell"),
                ("description", ""),
                ("min_stock", min_stock),
                ("price", "2500,00"),
                ("category_id", ""),
                ("csrf_token", &token),
            ],
        )
        .await
}

async fn record(client: &mut TestClient, product_id: i64, direction: &str, quantity: &str) -> Response<Body> {
    let token = client.csrf("/movimentacao/nova").await;
    let product_id = product_id.to_string();
    client
        .post(
            "/movimentacao/nova",
            &[
                ("product_id", product_id.as_str()),
                ("direction", direction),
                ("quantity", quantity),
                ("note", ""),
                ("csrf_token", &token),
            ],
        )
        .await
}

#[tokio::test]
async fn test_anonymous_page_redirects_to_login() {
    let state = setup().await;
    let mut client = TestClient::new(&state);

    let response = client.get("/produtos?busca=papel").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?next=%2Fprodutos%3Fbusca%3Dpapel");

    let page = client.get_text("/login").await;
    assert!(page.contains("Por favor, faça login para acessar esta página."));
}

#[tokio::test]
async fn test_anonymous_api_gets_401() {
    let state = setup().await;
    let mut client = TestClient::new(&state);

    let response = client.get("/api/alertas").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_root_redirects_by_login_state() {
    let state = setup().await;
    let mut client = TestClient::new(&state);
    assert_eq!(location(&client.get("/").await), "/login");

    let mut admin = admin_client(&state).await;
    assert_eq!(location(&admin.get("/").await), "/dashboard");
    assert_eq!(location(&admin.get("/login").await), "/dashboard");
}

#[tokio::test]
async fn test_login_failure_is_generic() {
    let state = setup().await;
    let mut client = TestClient::new(&state);

    let wrong_password = body_text(client.login("admin@estoque.com", "errada").await).await;
    assert!(wrong_password.contains("Email ou senha inválidos."));

    let unknown_email = body_text(client.login("ninguem@estoque.com", "admin123").await).await;
    assert!(unknown_email.contains("Email ou senha inválidos."));
}

#[tokio::test]
async fn test_login_rotates_session_and_greets() {
    let state = setup().await;
    let mut client = TestClient::new(&state);
    client.get("/login").await;
    let anonymous_cookie = client.cookie.clone().unwrap();

    let response = client.login("admin@estoque.com", "admin123").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    assert_ne!(client.cookie.clone().unwrap(), anonymous_cookie);

    let dashboard = client.get_text("/dashboard").await;
    assert!(dashboard.contains("Bem-vindo, Administrador!"));
}

#[tokio::test]
async fn test_login_follows_only_local_next() {
    let state = setup().await;

    let mut client = TestClient::new(&state);
    let token = client.csrf("/login").await;
    let response = client
        .post(
            "/login?next=%2Fmovimentacoes",
            &[("email", "admin@estoque.com"), ("password", "admin123"), ("csrf_token", &token)],
        )
        .await;
    assert_eq!(location(&response), "/movimentacoes");

    let mut client = TestClient::new(&state);
    let token = client.csrf("/login").await;
    let response = client
        .post(
            "/login?next=%2F%2Fevil.example",
            &[("email", "admin@estoque.com"), ("password", "admin123"), ("csrf_token", &token)],
        )
        .await;
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_post_without_csrf_is_forbidden() {
    let state = setup().await;
    let mut client = admin_client(&state).await;

    let response = client
        .post("/produto/novo", &[("code", "PROD001"), ("name", "Notebook Dell"), ("min_stock", "5")])
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(state.products.count_active().await.unwrap(), 0);
}

#[tokio::test]
async fn test_regular_user_cannot_create_products() {
    let state = setup().await;
    let mut client = TestClient::new(&state);
    client.login("usuario@estoque.com", "user123").await;

    let token = client.csrf("/movimentacao/nova").await;
    let response = client
        .post(
            "/produto/novo",
            &[("code", "PROD001"), ("name", "Notebook Dell"), ("min_stock", "5"), ("csrf_token", &token)],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    assert!(state.products.find_by_code("PROD001").await.unwrap().is_none());

    let dashboard = client.get_text("/dashboard").await;
    assert!(dashboard.contains("Acesso negado. Apenas administradores podem acessar esta funcionalidade."));

    assert_eq!(location(&client.get("/alertas").await), "/dashboard");
    assert_eq!(location(&client.get("/usuarios").await), "/dashboard");
}

#[tokio::test]
async fn test_product_lifecycle_and_duplicate_code() {
    let state = setup().await;
    let mut client = admin_client(&state).await;

    let response = create_product(&mut client, "PROD001", "5").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/produtos");

    let listing = client.get_text("/produtos").await;
    assert!(listing.contains("Produto Notebook Dell cadastrado com sucesso!"));
    assert!(listing.contains("R$ 2.500,00"));

    let duplicate = create_product(&mut client, "PROD001", "5").await;
    assert_eq!(duplicate.status(), StatusCode::OK);
    assert!(body_text(duplicate).await.contains("Este código já está em uso por outro produto."));

    let product = state.products.find_by_code("PROD001").await.unwrap().unwrap();
    for _ in 0..2 {
        let token = client.csrf("/produto/novo").await;
        let response = client
            .post(&format!("/produto/{}/excluir", product.id), &[("csrf_token", &token)])
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/produtos");
        assert!(!state.products.get(product.id).await.unwrap().active);
    }

    // inactive codes stay reserved
    let again = create_product(&mut client, "PROD001", "5").await;
    assert_eq!(again.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_stock_exit_scenario() {
    let state = setup().await;
    let mut admin = admin_client(&state).await;
    create_product(&mut admin, "PROD001", "5").await;
    let id = state.products.find_by_code("PROD001").await.unwrap().unwrap().id;

    assert_eq!(record(&mut admin, id, "entrada", "10").await.status(), StatusCode::SEE_OTHER);

    // regular users record movements too
    let mut user = TestClient::new(&state);
    user.login("usuario@estoque.com", "user123").await;
    let response = record(&mut user, id, "saida", "10").await;
    assert_eq!(location(&response), "/movimentacoes");

    let product = state.products.get(id).await.unwrap();
    assert_eq!(product.quantity, 0);
    assert!(product.is_low_stock());

    let rejected = record(&mut user, id, "saida", "1").await;
    assert_eq!(rejected.status(), StatusCode::OK);
    assert!(body_text(rejected).await.contains("Quantidade insuficiente em estoque. Disponível: 0"));
    assert_eq!(state.products.get(id).await.unwrap().quantity, 0);

    let movements = user.get_text("/movimentacoes").await;
    assert!(movements.contains("Usuário Comum"));
    assert!(movements.contains("Administrador"));
}

#[tokio::test]
async fn test_zero_quantity_is_a_form_error() {
    let state = setup().await;
    let mut admin = admin_client(&state).await;
    create_product(&mut admin, "PROD001", "5").await;
    let id = state.products.find_by_code("PROD001").await.unwrap().unwrap().id;

    let response = record(&mut admin, id, "entrada", "0").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Quantidade deve ser maior que zero"));
    assert_eq!(state.products.get(id).await.unwrap().quantity, 0);
}

#[tokio::test]
async fn test_api_endpoints() {
    let state = setup().await;
    let mut client = admin_client(&state).await;
    create_product(&mut client, "PROD001", "5").await;
    let id = state.products.find_by_code("PROD001").await.unwrap().unwrap().id;

    let alerts: serde_json::Value =
        serde_json::from_str(&client.get_text("/api/alertas").await).unwrap();
    assert_eq!(alerts["total"], 1);
    assert_eq!(alerts["produtos"][0]["codigo"], "PROD001");
    assert_eq!(alerts["produtos"][0]["estoque_minimo"], 5);

    let product: serde_json::Value =
        serde_json::from_str(&client.get_text(&format!("/api/produto/{}", id)).await).unwrap();
    assert_eq!(product["codigo"], "PROD001");
    assert_eq!(product["quantidade"], 0);
    assert_eq!(product["status"], "baixo");
    assert_eq!(product["ativo"], true);
    assert_eq!(product["preco"].as_f64(), Some(2500.0));

    let missing = client.get("/api/produto/999").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_cannot_deactivate_self_but_can_deactivate_others() {
    let state = setup().await;
    let mut admin = admin_client(&state).await;
    let me = state.users.first_active_admin().await.unwrap().unwrap();

    let token = admin.csrf("/usuarios").await;
    admin
        .post(&format!("/usuario/{}/desativar", me.id), &[("csrf_token", &token)])
        .await;
    assert!(state.users.get(me.id).await.unwrap().active);

    let mut user = TestClient::new(&state);
    user.login("usuario@estoque.com", "user123").await;
    assert_eq!(user.get("/dashboard").await.status(), StatusCode::OK);

    let other = state
        .users
        .authenticate("usuario@estoque.com", "user123")
        .await
        .unwrap()
        .unwrap();
    let token = admin.csrf("/usuarios").await;
    admin
        .post(&format!("/usuario/{}/desativar", other.id), &[("csrf_token", &token)])
        .await;
    assert!(!state.users.get(other.id).await.unwrap().active);

    // the deactivated user's session stops authenticating
    assert_eq!(user.get("/dashboard").await.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_unknown_route_and_favicon() {
    let state = setup().await;
    let mut client = TestClient::new(&state);

    assert_eq!(client.get("/nao-existe").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(client.get("/favicon.ico").await.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_logout_unbinds_session() {
    let state = setup().await;
    let mut client = admin_client(&state).await;

    let response = client.get("/logout").await;
    assert_eq!(location(&response), "/login");

    let page = client.get_text("/login").await;
    assert!(page.contains("Você foi desconectado do sistema."));
    assert_eq!(client.get("/dashboard").await.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_page_number_at_integer_limit() {
    let state = setup().await;
    let mut client = admin_client(&state).await;
    create_product(&mut client, "PROD001", "5").await;

    let page = i64::MAX;
    let products = client.get_text(&format!("/produtos?page={}", page)).await;
    assert!(products.contains("Nenhum produto encontrado."));

    let movements = client.get(&format!("/movimentacoes?page={}", page)).await;
    assert_eq!(movements.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_cannot_change_own_role() {
    let state = setup().await;
    let mut admin = admin_client(&state).await;
    let me = state.users.first_active_admin().await.unwrap().unwrap();
    let edit_url = format!("/usuario/{}/editar", me.id);

    let token = admin.csrf(&edit_url).await;
    let response = admin
        .post(
            &edit_url,
            &[
                ("name", me.name.as_str()),
                ("email", me.email.as_str()),
                ("role", "comum"),
                ("csrf_token", &token),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Você não pode alterar o seu próprio perfil de acesso."));
    assert_eq!(state.users.get(me.id).await.unwrap().role, Role::Admin);

    // renaming yourself is still allowed
    let token = admin.csrf(&edit_url).await;
    let response = admin
        .post(
            &edit_url,
            &[("name", "Administradora"), ("email", me.email.as_str()), ("role", "admin"), ("csrf_token", &token)],
        )
        .await;
    assert_eq!(location(&response), "/usuarios");
    assert_eq!(state.users.get(me.id).await.unwrap().name, "Administradora");
}
