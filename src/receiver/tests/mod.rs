mod decrypt;
mod sync;
mod timing;
