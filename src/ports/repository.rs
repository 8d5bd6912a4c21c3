use crate::types::push::Subscription;

pub trait SubscriptionRepository: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type QueryFut<'a>: Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + 'a
    where
        Self: 'a;
    type DeleteFut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    /// All subscriptions, or only those owned by `recipient_ids`.
    fn query<'a>(&'a self, recipient_ids: Option<&'a [String]>) -> Self::QueryFut<'a>;

    fn batch_delete<'a>(&'a self, endpoints: &'a [String]) -> Self::DeleteFut<'a>;
}
