use grpc_interceptors::{IdentityExt, Pipeline, ServerStream};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::debug;

use super::proto::product::product_service_server::ProductService as ProductRpc;
use super::proto::product::{
    CreateProductRequest, CreateProductResponse, DeleteProductRequest, DeleteProductResponse,
    GetProductRequest, GetProductResponse, ListProductsRequest, ListProductsResponse,
    ProductData, UpdateProductRequest, UpdateProductResponse,
};
use crate::models::{format_timestamp, Product, ProductDraft};
use crate::services::ProductService;

/// gRPC front of [`ProductService`]; every method goes through the shared pipeline
#[derive(Clone)]
pub struct ProductGrpcService {
    pipeline: Pipeline,
    products: ProductService,
}

impl ProductGrpcService {
    pub fn new(pipeline: Pipeline, products: ProductService) -> Self {
        Self { pipeline, products }
    }

    async fn handle_create(
        &self,
        request: Request<CreateProductRequest>,
    ) -> Result<Response<CreateProductResponse>, Status> {
        let caller = request.require_identity()?.clone();
        let req = request.into_inner();
        let product = self
            .products
            .create(
                &caller,
                ProductDraft {
                    name: req.name,
                    description: req.description,
                    price: req.price,
                    stock: req.stock,
                },
            )
            .await?;

        Ok(Response::new(CreateProductResponse {
            success: true,
            message: "Product created successfully".to_string(),
            product: Some(product_data(&product)),
        }))
    }

    async fn handle_get(
        &self,
        request: Request<GetProductRequest>,
    ) -> Result<Response<GetProductResponse>, Status> {
        let product = self.products.get(request.get_ref().id).await?;

        Ok(Response::new(GetProductResponse {
            success: true,
            message: "OK".to_string(),
            product: Some(product_data(&product)),
        }))
    }

    async fn handle_list(
        &self,
        request: Request<ListProductsRequest>,
    ) -> Result<Response<ListProductsResponse>, Status> {
        let caller = request.require_identity()?;
        let products = self.products.list_owned(caller).await?;

        Ok(Response::new(ListProductsResponse {
            success: true,
            message: "OK".to_string(),
            products: products.iter().map(product_data).collect(),
        }))
    }

    async fn handle_update(
        &self,
        request: Request<UpdateProductRequest>,
    ) -> Result<Response<UpdateProductResponse>, Status> {
        let caller = request.require_identity()?.clone();
        let req = request.into_inner();
        let product = self
            .products
            .update(
                &caller,
                req.id,
                ProductDraft {
                    name: req.name,
                    description: req.description,
                    price: req.price,
                    stock: req.stock,
                },
            )
            .await?;

        Ok(Response::new(UpdateProductResponse {
            success: true,
            message: "Product updated successfully".to_string(),
            product: Some(product_data(&product)),
        }))
    }

    async fn handle_delete(
        &self,
        request: Request<DeleteProductRequest>,
    ) -> Result<Response<DeleteProductResponse>, Status> {
        let caller = request.require_identity()?;
        self.products.delete(caller, request.get_ref().id).await?;

        Ok(Response::new(DeleteProductResponse {
            success: true,
            message: "Product deleted".to_string(),
        }))
    }
}

/// Answer each requested id with the current product, in request order
async fn watch_products(
    products: ProductService,
    mut stream: ServerStream<GetProductRequest, ProductData>,
) -> Result<(), Status> {
    while let Some(request) = stream.message().await? {
        debug!(product_id = request.id, "watch lookup");
        let product = products.get(request.id).await?;
        stream.send(product_data(&product)).await?;
    }
    Ok(())
}

#[tonic::async_trait]
impl ProductRpc for ProductGrpcService {
    type WatchProductsStream = ReceiverStream<Result<ProductData, Status>>;

    async fn create_product(
        &self,
        request: Request<CreateProductRequest>,
    ) -> Result<Response<CreateProductResponse>, Status> {
        self.pipeline
            .unary(request, |request| self.handle_create(request))
            .await
    }

    async fn get_product(
        &self,
        request: Request<GetProductRequest>,
    ) -> Result<Response<GetProductResponse>, Status> {
        self.pipeline
            .unary(request, |request| self.handle_get(request))
            .await
    }

    async fn list_products(
        &self,
        request: Request<ListProductsRequest>,
    ) -> Result<Response<ListProductsResponse>, Status> {
        self.pipeline
            .unary(request, |request| self.handle_list(request))
            .await
    }

    async fn update_product(
        &self,
        request: Request<UpdateProductRequest>,
    ) -> Result<Response<UpdateProductResponse>, Status> {
        self.pipeline
            .unary(request, |request| self.handle_update(request))
            .await
    }

    async fn delete_product(
        &self,
        request: Request<DeleteProductRequest>,
    ) -> Result<Response<DeleteProductResponse>, Status> {
        self.pipeline
            .unary(request, |request| self.handle_delete(request))
            .await
    }

    async fn watch_products(
        &self,
        request: Request<Streaming<GetProductRequest>>,
    ) -> Result<Response<Self::WatchProductsStream>, Status> {
        let products = self.products.clone();
        Ok(self
            .pipeline
            .spawn_stream(request, move |stream| watch_products(products, stream)))
    }
}

fn product_data(product: &Product) -> ProductData {
    ProductData {
        id: product.id,
        name: product.name.clone(),
        description: product.description.clone(),
        price: product.price,
        stock: product.stock,
        user_id: product.owner_id,
        created_at: format_timestamp(&product.created_at),
        updated_at: format_timestamp(&product.updated_at),
    }
}
