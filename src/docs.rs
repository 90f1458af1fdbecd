use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::payments::create_order,
        crate::api::payments::verify_payment,
        crate::api::payments::get_plans
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::payments::CreateOrderRequest,
            crate::api::payments::VerifyPaymentRequest,
            crate::entitlement::EntitlementView
        )
    ),
    tags(
        (name = "auth", description = "Authentication"),
        (name = "payment", description = "Subscription orders and verification")
    )
)]
pub struct ApiDoc;
