/// Generate a client method with oneshot channel boilerplate and automatic tracing.
///
/// Each parameter becomes a field of the request variant; channel failures are
/// reported through the error type's `ActorCommunicationError` variant.
#[macro_export]
macro_rules! client_method {
    ($client:ty => fn $method:ident($($param:ident: $param_type:ty),*) -> $return_type:ty as $request:ident::$variant:ident, Error = $error_type:ty) => {
        #[allow(dead_code)]
        impl $client {
            #[tracing::instrument(skip(self))]
            pub async fn $method(&self, $($param: $param_type),*) -> Result<$return_type, $error_type> {
                tracing::debug!("Sending request");
                let (respond_to, response) = tokio::sync::oneshot::channel();
                self.sender
                    .send($request::$variant {
                        $($param,)*
                        respond_to,
                    })
                    .await
                    .map_err(|_| <$error_type>::ActorCommunicationError("Actor closed".to_string()))?;

                response
                    .await
                    .map_err(|_| <$error_type>::ActorCommunicationError("Actor dropped".to_string()))?
            }
        }
    };
}

/// Generate the add/update/delete/get quartet for one mirrored record type.
///
/// `impl_record_methods!(StoreClient, Item, ItemCreate, ItemPatch, item)` expects
/// `StoreRequest::{AddItem, UpdateItem, DeleteItem, GetItem}` and produces
/// `add_item`, `update_item`, `delete_item` and `get_item`.
#[macro_export]
macro_rules! impl_record_methods {
    ($client:ident, $entity:ident, $create:ty, $patch:ty, $entity_name_snake:ident) => {
        paste::paste! {
            $crate::client_method!($client => fn [<add_ $entity_name_snake>](payload: $create) -> String as StoreRequest::[<Add $entity>], Error = StoreError);
            $crate::client_method!($client => fn [<update_ $entity_name_snake>](id: String, patch: $patch) -> $entity as StoreRequest::[<Update $entity>], Error = StoreError);
            $crate::client_method!($client => fn [<delete_ $entity_name_snake>](id: String) -> () as StoreRequest::[<Delete $entity>], Error = StoreError);
            $crate::client_method!($client => fn [<get_ $entity_name_snake>](id: String) -> Option<$entity> as StoreRequest::[<Get $entity>], Error = StoreError);
        }
    };
}
