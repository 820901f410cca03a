use grpc_interceptors::{IdentityExt, Pipeline};
use tonic::{Request, Response, Status};

use super::proto::user::user_service_server::UserService as UserRpc;
use super::proto::user::{
    GetProfileRequest, GetProfileResponse, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, UserData,
};
use crate::models::{format_timestamp, Registration, User};
use crate::services::UserService;

/// gRPC front of [`UserService`]; every method goes through the shared pipeline
#[derive(Clone)]
pub struct UserGrpcService {
    pipeline: Pipeline,
    users: UserService,
}

impl UserGrpcService {
    pub fn new(pipeline: Pipeline, users: UserService) -> Self {
        Self { pipeline, users }
    }

    async fn handle_register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let req = request.into_inner();
        let user = self
            .users
            .register(Registration {
                username: req.username,
                email: req.email,
                password: req.password,
                full_name: req.full_name,
            })
            .await?;

        Ok(Response::new(RegisterResponse {
            success: true,
            message: "User registered successfully".to_string(),
            user: Some(user_data(&user)),
        }))
    }

    async fn handle_login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        let outcome = self.users.login(&req.email, &req.password).await?;

        Ok(Response::new(LoginResponse {
            success: true,
            message: "Login successful".to_string(),
            token: outcome.token,
            user: Some(user_data(&outcome.user)),
        }))
    }

    async fn handle_get_profile(
        &self,
        request: Request<GetProfileRequest>,
    ) -> Result<Response<GetProfileResponse>, Status> {
        let user_id = request.require_identity()?.subject_id();
        let user = self.users.profile(user_id).await?;

        Ok(Response::new(GetProfileResponse {
            success: true,
            message: "Profile retrieved successfully".to_string(),
            user: Some(user_data(&user)),
        }))
    }
}

#[tonic::async_trait]
impl UserRpc for UserGrpcService {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        self.pipeline
            .unary(request, |request| self.handle_register(request))
            .await
    }

    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        self.pipeline
            .unary(request, |request| self.handle_login(request))
            .await
    }

    async fn get_profile(
        &self,
        request: Request<GetProfileRequest>,
    ) -> Result<Response<GetProfileResponse>, Status> {
        self.pipeline
            .unary(request, |request| self.handle_get_profile(request))
            .await
    }
}

fn user_data(user: &User) -> UserData {
    UserData {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        created_at: format_timestamp(&user.created_at),
        updated_at: format_timestamp(&user.updated_at),
    }
}
