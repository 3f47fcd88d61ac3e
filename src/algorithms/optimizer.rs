use nalgebra::DVector;

#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    learning_rate: f64,
    regularization: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64, regularization: f64) -> Self {
        Self {
            learning_rate,
            regularization,
        }
    }

    // Both gradients come from the vectors passed in; neither update sees the other.
    pub fn step(
        &self,
        user: &DVector<f64>,
        item: &DVector<f64>,
        error: f64,
    ) -> (DVector<f64>, DVector<f64>) {
        let user_gradient = item * error - user * self.regularization;
        let item_gradient = user * error - item * self.regularization;

        let new_user = user + user_gradient * self.learning_rate;
        let new_item = item + item_gradient * self.learning_rate;
        (new_user, new_item)
    }
}
